use serde::Serialize;
use thiserror::Error;

/// Closed set of error classifications the core surfaces to callers and to
/// `OnError` observers. Every crate-local error type exposes a `kind()`
/// accessor into this set so the progress bus and session glue can react
/// uniformly without matching on crate-specific error enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConfigInvalid,
    InputTooLarge,
    TransientNetwork,
    RateLimited,
    InvalidStructuredOutput,
    ContextOverflow,
    ProviderError,
    ToolFailure,
    Cancelled,
    QuotaExceeded,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "CONFIG_INVALID",
            ErrorKind::InputTooLarge => "INPUT_TOO_LARGE",
            ErrorKind::TransientNetwork => "TRANSIENT_NETWORK",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::InvalidStructuredOutput => "INVALID_STRUCTURED_OUTPUT",
            ErrorKind::ContextOverflow => "CONTEXT_OVERFLOW",
            ErrorKind::ProviderError => "PROVIDER_ERROR",
            ErrorKind::ToolFailure => "TOOL_FAILURE",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input too large: {actual} bytes exceeds hard limit {limit}")]
    InputTooLarge { actual: usize, limit: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InputTooLarge { .. } => ErrorKind::InputTooLarge,
            CoreError::Config(_) => ErrorKind::ConfigInvalid,
            CoreError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

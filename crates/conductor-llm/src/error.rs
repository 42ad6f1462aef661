use conductor_core::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("model returned output that does not match the expected structure: {0}")]
    InvalidStructuredOutput(String),

    #[error("conversation exceeds the model's context window")]
    ContextOverflow,

    #[error("operation cancelled")]
    Cancelled,

    #[error("missing credential: {0}")]
    MissingCredential(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Http(_) => ErrorKind::TransientNetwork,
            LlmError::Api { status, .. } if *status >= 500 => ErrorKind::TransientNetwork,
            LlmError::Api { .. } => ErrorKind::ProviderError,
            LlmError::Parse(_) => ErrorKind::InvalidStructuredOutput,
            LlmError::RateLimited { .. } => ErrorKind::RateLimited,
            LlmError::Unavailable(_) => ErrorKind::ProviderError,
            LlmError::InvalidStructuredOutput(_) => ErrorKind::InvalidStructuredOutput,
            LlmError::ContextOverflow => ErrorKind::ContextOverflow,
            LlmError::Cancelled => ErrorKind::Cancelled,
            LlmError::MissingCredential(_) => ErrorKind::ConfigInvalid,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed persistence file: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("reminder cap exceeded for user {user_ref}")]
    QuotaExceeded { user_ref: String },

    #[error("event not found: {id}")]
    NotFound { id: String },
}

impl SchedulerError {
    pub fn kind(&self) -> conductor_core::ErrorKind {
        match self {
            SchedulerError::Io(_) | SchedulerError::Serde(_) => conductor_core::ErrorKind::Internal,
            SchedulerError::QuotaExceeded { .. } => conductor_core::ErrorKind::QuotaExceeded,
            SchedulerError::NotFound { .. } => conductor_core::ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

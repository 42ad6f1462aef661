use conductor_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("llm call failed: {0}")]
    Llm(#[from] conductor_llm::LlmError),
    #[error("cancelled")]
    Cancelled,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Llm(e) => e.kind(),
            GraphError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

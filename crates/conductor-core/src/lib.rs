//! Shared types for the agent orchestration core: the conversation model
//! (C1), the config surface (C9), and the error vocabulary every other
//! crate's error type classifies into.

pub mod config;
pub mod conversation;
pub mod error;
pub mod types;

pub use config::Config;
pub use conversation::{
    collect, Attachment, CollectLimits, CollectRequest, CollectSummary, Content, ContentPart,
    Message, MessageMetadata, Role,
};
pub use error::{CoreError, ErrorKind, Result};
pub use types::{
    AgentPlan, ProgressEvent, ProgressStage, ReminderDetails, Source, StreamingChunk, ToolCall,
    ToolContent, ToolExecutionResult,
};

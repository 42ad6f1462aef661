//! LLM gateway (C3): provider abstraction, Anthropic + Gemini providers,
//! the four-role gateway, streaming contract, and provider health tracking.

pub mod anthropic;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod health;
pub mod provider;
pub mod stream;

pub use anthropic::AnthropicProvider;
pub use error::{LlmError, Result};
pub use gateway::{LlmGateway, Role, RoleRequest};
pub use gemini::GeminiProvider;
pub use health::HealthTracker;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ToolCall, ToolDefinition};
pub use stream::StreamEvent;

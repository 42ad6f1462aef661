//! Tool registry (C2): the `Tool` trait, dispatch with per-call timeouts,
//! and three concrete tools (web search, video summary, reminder setter).

pub mod registry;
pub mod tools;

pub use registry::{Tool, ToolContext, ToolDecl, ToolRegistry};
pub use tools::{extract_canonical_id, ReminderSetterTool, SearchBackend, SummaryBackend, VideoSummaryTool, WebSearchTool};

//! Shared, invocation-independent context the nodes read from: the LLM
//! gateway, tool registry, progress bus, and the slice of config each node
//! needs. One `GraphContext` is built per request by C10 and reused across
//! every Plan/Execute/Reflect/Finalize call within that invocation.

use std::sync::Arc;

use conductor_core::config::{AgentBehaviorConfig, PersonaConfig, StreamingConfig};
use conductor_llm::LlmGateway;
use conductor_media::EmojiRegistry;
use conductor_tools::{ToolContext, ToolRegistry};

pub struct GraphContext {
    pub llm: Arc<LlmGateway>,
    pub tools: Arc<ToolRegistry>,
    pub tool_ctx: ToolContext,
    pub bus: Arc<conductor_bus::ProgressBus>,
    pub behavior: AgentBehaviorConfig,
    pub streaming: StreamingConfig,
    pub persona: PersonaConfig,
    /// Persona names available for random selection. Loading the persona
    /// *files* is an external collaborator's job (§1 out of scope); the
    /// graph only ever sees names.
    pub available_personas: Vec<String>,
    pub emoji_registry: Arc<EmojiRegistry>,
    pub guild_id: Option<String>,
}

//! Common provider interface implemented by `AnthropicProvider` and
//! `GeminiProvider`. The four-role gateway (`gateway.rs`) is the only
//! caller — tool registry and graph code never talk to a provider directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::stream::StreamEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Tool definition sent to the LLM API, mirroring `conductor_tools::ToolSpec`
/// without this crate depending on `conductor-tools` (the dependency points
/// the other way: tools are bound onto the gateway, not the reverse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tools to expose to the LLM. Empty outside the Plan/Execute rounds.
    pub tools: Vec<ToolDefinition>,
    /// Raw provider-native message history for the tool loop — lets the
    /// graph build structured `tool_use`/`tool_result` blocks that have no
    /// plain-string representation. Overrides `messages` when set.
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Stream response events through a channel. Default implementation
    /// falls back to a single non-streaming call and replays it as one
    /// `TextDelta` plus `Done` — providers that support real SSE streaming
    /// (Anthropic) override this.
    async fn send_stream(&self, req: &ChatRequest, tx: mpsc::Sender<StreamEvent>) -> Result<()> {
        let resp = self.send(req).await?;
        let _ = tx
            .send(StreamEvent::TextDelta {
                text: resp.content,
            })
            .await;
        let _ = tx
            .send(StreamEvent::Done {
                model: resp.model,
                tokens_in: resp.tokens_in,
                tokens_out: resp.tokens_out,
                stop_reason: resp.stop_reason,
            })
            .await;
        Ok(())
    }
}

//! Anthropic Messages API provider. Reads `ANTHROPIC_API_KEY` from the
//! environment at construction time — never from the config file (§6).

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ToolCall};
use crate::stream::{parse_sse_line, SseParsed, StreamEvent};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }

    /// Construct from the standard `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::MissingCredential("ANTHROPIC_API_KEY".into()))?;
        Ok(Self::new(api_key, None))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("x-api-key", &self.api_key)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let body = build_request_body(req, false);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %req.model, "sending request to Anthropic");

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let resp = self.apply_auth(builder).send().await?;
        let status = resp.status().as_u16();

        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5000);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
            return Err(LlmError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }

    async fn send_stream(&self, req: &ChatRequest, tx: mpsc::Sender<StreamEvent>) -> Result<()> {
        let body = build_request_body(req, true);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %req.model, "sending streaming request to Anthropic");

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let resp = self.apply_auth(builder).send().await?;
        let status = resp.status().as_u16();

        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5000);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic streaming API error");
            return Err(LlmError::Api {
                status,
                message: text,
            });
        }

        process_sse_stream(resp, tx).await;
        Ok(())
    }
}

fn build_request_body(req: &ChatRequest, stream: bool) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = if let Some(ref raw) = req.raw_messages {
        raw.clone()
    } else {
        req.messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect()
    };

    let mut body = serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
        "system": req.system,
        "messages": messages,
        "stream": stream,
    });

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }

    body
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in resp.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, name, input });
            }
            ContentBlock::Unknown => {}
        }
    }

    ChatResponse {
        content: text_parts.join(""),
        model: resp.model,
        tokens_in: resp.usage.input_tokens,
        tokens_out: resp.usage.output_tokens,
        stop_reason: resp.stop_reason.unwrap_or_default(),
        tool_calls,
    }
}

/// Drive an Anthropic SSE body into `StreamEvent`s. Anthropic's stream is a
/// sequence of `content_block_delta`/`content_block_start`/`message_delta`
/// events; we only need text deltas, tool_use blocks, and the terminal
/// `message_stop` for this gateway's purposes.
async fn process_sse_stream(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut byte_stream = resp.bytes_stream();
    let mut buf = String::new();
    let mut model = String::new();
    let mut tokens_in = 0u32;
    let mut tokens_out = 0u32;
    let mut stop_reason = String::new();
    let mut pending_tool: Option<(String, String, String)> = None;

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error { message: e.to_string() }).await;
                return;
            }
        };
        buf.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(idx) = buf.find("\n\n") {
            let frame = buf[..idx].to_string();
            buf.drain(..idx + 2);

            let mut data_line = None;
            for line in frame.lines() {
                if let Some(SseParsed::Data(d)) = parse_sse_line(line) {
                    data_line = Some(d);
                }
            }
            let Some(data) = data_line else { continue };
            if data == "[DONE]" {
                continue;
            }
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&data) else {
                continue;
            };

            match value.get("type").and_then(|t| t.as_str()) {
                Some("message_start") => {
                    if let Some(m) = value["message"]["model"].as_str() {
                        model = m.to_string();
                    }
                    if let Some(n) = value["message"]["usage"]["input_tokens"].as_u64() {
                        tokens_in = n as u32;
                    }
                }
                Some("content_block_start") => {
                    if value["content_block"]["type"] == "tool_use" {
                        let id = value["content_block"]["id"].as_str().unwrap_or_default();
                        let name = value["content_block"]["name"].as_str().unwrap_or_default();
                        pending_tool = Some((id.to_string(), name.to_string(), String::new()));
                    }
                }
                Some("content_block_delta") => {
                    if let Some(text) = value["delta"]["text"].as_str() {
                        let _ = tx
                            .send(StreamEvent::TextDelta {
                                text: text.to_string(),
                            })
                            .await;
                    } else if let Some(partial) = value["delta"]["partial_json"].as_str() {
                        if let Some((_, _, ref mut acc)) = pending_tool {
                            acc.push_str(partial);
                        }
                    }
                }
                Some("content_block_stop") => {
                    if let Some((id, name, acc)) = pending_tool.take() {
                        let input: serde_json::Value =
                            serde_json::from_str(&acc).unwrap_or(serde_json::Value::Null);
                        let _ = tx.send(StreamEvent::ToolUse { id, name, input }).await;
                    }
                }
                Some("message_delta") => {
                    if let Some(sr) = value["delta"]["stop_reason"].as_str() {
                        stop_reason = sr.to_string();
                    }
                    if let Some(n) = value["usage"]["output_tokens"].as_u64() {
                        tokens_out = n as u32;
                    }
                }
                _ => {}
            }
        }
    }

    let _ = tx
        .send(StreamEvent::Done {
            model,
            tokens_in,
            tokens_out,
            stop_reason,
        })
        .await;
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Message, Role};

    #[test]
    fn build_request_body_includes_temperature_and_system() {
        let req = ChatRequest {
            model: "claude-sonnet-4-6".into(),
            system: "be terse".into(),
            messages: vec![Message {
                role: Role::User,
                content: "hi".into(),
            }],
            max_tokens: 100,
            temperature: 0.3,
            tools: vec![],
            raw_messages: None,
        };
        let body = build_request_body(&req, false);
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parse_response_splits_text_and_tool_calls() {
        let resp = ApiResponse {
            model: "claude-sonnet-4-6".into(),
            content: vec![
                ContentBlock::Text { text: "hello ".into() },
                ContentBlock::Text { text: "world".into() },
                ContentBlock::ToolUse {
                    id: "tc_1".into(),
                    name: "web_search".into(),
                    input: serde_json::json!({"query": "rust"}),
                },
            ],
            stop_reason: Some("tool_use".into()),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        };
        let parsed = parse_response(resp);
        assert_eq!(parsed.content, "hello world");
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "web_search");
    }
}

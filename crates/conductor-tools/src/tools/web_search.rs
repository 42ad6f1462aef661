//! Web-search tool: returns synthesized text plus harvested `Source`s.
//!
//! The concrete search backend is behind a trait so the tool itself stays a
//! thin adapter — tests substitute a stub backend rather than hitting a real
//! search API.

use async_trait::async_trait;
use conductor_core::error::ErrorKind;
use conductor_core::types::{Source, ToolCall, ToolContent, ToolExecutionResult};

use crate::registry::{Tool, ToolContext};

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, http: &reqwest::Client) -> Result<Vec<Source>, String>;
}

/// Queries a configurable search API (left generic — the API key and
/// endpoint live in the backend implementation, not in this tool).
pub struct WebSearchTool<B: SearchBackend> {
    backend: B,
}

impl<B: SearchBackend> WebSearchTool<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: SearchBackend + 'static> Tool for WebSearchTool<B> {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Use this when the user's question depends on \
         facts that may have changed since training, or that you don't already know."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                }
            },
            "required": ["query"]
        })
    }

    fn default_priority(&self) -> i32 {
        10
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecutionResult {
        let query = match call.arguments.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.is_empty() => q,
            _ => {
                return ToolExecutionResult::failed(
                    call.task_id.clone(),
                    self.name(),
                    ErrorKind::ToolFailure,
                    "'query' is required",
                )
            }
        };

        match self.backend.search(query, &ctx.http).await {
            Ok(sources) => {
                let summary = sources
                    .iter()
                    .map(|s| format!("- {} ({}): {}", s.title, s.url, s.snippet))
                    .collect::<Vec<_>>()
                    .join("\n");
                let mut result = ToolExecutionResult::ok(
                    call.task_id.clone(),
                    self.name(),
                    ToolContent::Text(summary),
                );
                result.sources = sources;
                result
            }
            Err(message) => ToolExecutionResult::failed(
                call.task_id.clone(),
                self.name(),
                ErrorKind::TransientNetwork,
                message,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend {
        sources: Vec<Source>,
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        async fn search(&self, _query: &str, _http: &reqwest::Client) -> Result<Vec<Source>, String> {
            Ok(self.sources.clone())
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            http: reqwest::Client::new(),
            timezone: chrono_tz::UTC,
        }
    }

    #[tokio::test]
    async fn search_returns_sources_and_summary() {
        let tool = WebSearchTool::new(StubBackend {
            sources: vec![Source {
                title: "Rust".into(),
                url: "https://rust-lang.org".into(),
                snippet: "A systems language".into(),
            }],
        });
        let call = ToolCall {
            task_id: "t1".into(),
            name: "web_search".into(),
            arguments: serde_json::json!({"query": "rust"}),
            priority: 0,
        };
        let result = tool.execute(&call, &ctx()).await;
        assert!(result.success);
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn missing_query_is_tool_failure() {
        let tool = WebSearchTool::new(StubBackend { sources: vec![] });
        let call = ToolCall {
            task_id: "t1".into(),
            name: "web_search".into(),
            arguments: serde_json::json!({}),
            priority: 0,
        };
        let result = tool.execute(&call, &ctx()).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::ToolFailure));
    }
}

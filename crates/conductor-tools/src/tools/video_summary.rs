//! Video-summary tool: extracts a canonical video id from a URL, summarizes
//! it via a pluggable backend, and caches the result for `ttl` (default 24h)
//! so repeated links in the same channel don't re-fetch. Cache keyed on the
//! canonical id, not the raw URL, per §4.2.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conductor_core::error::ErrorKind;
use conductor_core::types::{ToolCall, ToolContent, ToolExecutionResult};
use dashmap::DashMap;

use crate::registry::{Tool, ToolContext};

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn summarize(&self, video_id: &str, http: &reqwest::Client) -> Result<String, String>;
}

/// Extract a canonical video id from a recognized URL pattern. Used both by
/// this tool's cache key and by the graph's pre-detection hook (§4.5 step 4)
/// to synthesize a deterministic tool call before the planner even runs.
pub fn extract_canonical_id(text: &str) -> Option<String> {
    for token in text.split_whitespace() {
        if let Some(id) = extract_from_url(token) {
            return Some(id);
        }
    }
    None
}

fn extract_from_url(url: &str) -> Option<String> {
    if let Some(rest) = url.split("youtu.be/").nth(1) {
        return Some(rest.split(['?', '&']).next().unwrap_or(rest).to_string());
    }
    if url.contains("youtube.com/watch") {
        let query = url.split('?').nth(1)?;
        for pair in query.split('&') {
            if let Some(id) = pair.strip_prefix("v=") {
                return Some(id.to_string());
            }
        }
    }
    if let Some(rest) = url.split("youtube.com/shorts/").nth(1) {
        return Some(rest.split(['?', '&']).next().unwrap_or(rest).to_string());
    }
    None
}

struct CacheEntry {
    summary: String,
    inserted_at: Instant,
}

pub struct VideoSummaryTool<B: SummaryBackend> {
    backend: B,
    cache: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl<B: SummaryBackend> VideoSummaryTool<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: Arc::new(DashMap::new()),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn cached(&self, video_id: &str) -> Option<String> {
        let entry = self.cache.get(video_id)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.summary.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl<B: SummaryBackend + 'static> Tool for VideoSummaryTool<B> {
    fn name(&self) -> &str {
        "video_summary"
    }

    fn description(&self) -> &str {
        "Summarize the content of a video given its URL (YouTube links and similar). \
         Use this automatically whenever a message contains a recognized video link."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The video URL to summarize."
                }
            },
            "required": ["url"]
        })
    }

    fn default_priority(&self) -> i32 {
        0
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecutionResult {
        // The graph's pre-detection hook (§4.5 step 4) already ran
        // `extract_canonical_id` on the raw message and hands the id
        // straight through; LLM-issued calls go through the documented
        // `url` schema instead and get parsed here.
        let video_id = if let Some(id) = call.arguments.get("video_id").and_then(|v| v.as_str()) {
            id.to_string()
        } else {
            let url = match call.arguments.get("url").and_then(|v| v.as_str()) {
                Some(u) if !u.is_empty() => u,
                _ => {
                    return ToolExecutionResult::failed(
                        call.task_id.clone(),
                        self.name(),
                        ErrorKind::ToolFailure,
                        "'url' is required",
                    )
                }
            };

            match extract_canonical_id(url) {
                Some(id) => id,
                None => {
                    return ToolExecutionResult::failed(
                        call.task_id.clone(),
                        self.name(),
                        ErrorKind::ToolFailure,
                        "url did not match a recognized video pattern",
                    )
                }
            }
        };

        if let Some(summary) = self.cached(&video_id) {
            return ToolExecutionResult::ok(call.task_id.clone(), self.name(), ToolContent::Text(summary));
        }

        match self.backend.summarize(&video_id, &ctx.http).await {
            Ok(summary) => {
                // Last-write-wins on a concurrent race is acceptable (§5).
                self.cache.insert(
                    video_id,
                    CacheEntry {
                        summary: summary.clone(),
                        inserted_at: Instant::now(),
                    },
                );
                ToolExecutionResult::ok(call.task_id.clone(), self.name(), ToolContent::Text(summary))
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SummaryBackend for CountingBackend {
        async fn summarize(&self, video_id: &str, _http: &reqwest::Client) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("summary of {video_id}"))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            http: reqwest::Client::new(),
            timezone: chrono_tz::UTC,
        }
    }

    #[tokio::test]
    async fn pre_detected_video_id_argument_executes_without_a_url() {
        // Mirrors exactly what the graph's plan node synthesizes for a
        // deterministically pre-detected link.
        let tool = VideoSummaryTool::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let call = ToolCall {
            task_id: "t1".into(),
            name: "video_summary".into(),
            arguments: serde_json::json!({ "video_id": "abc123" }),
            priority: 0,
        };
        let result = tool.execute(&call, &ctx()).await;
        assert!(result.success);
    }

    #[test]
    fn extracts_id_from_watch_url() {
        assert_eq!(
            extract_canonical_id("check this out https://www.youtube.com/watch?v=abc123&t=5s"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn extracts_id_from_short_url() {
        assert_eq!(
            extract_canonical_id("https://youtu.be/xyz789"),
            Some("xyz789".to_string())
        );
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(extract_canonical_id("just some text"), None);
    }

    #[tokio::test]
    async fn second_call_for_same_video_hits_cache() {
        let tool = VideoSummaryTool::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let call = ToolCall {
            task_id: "t1".into(),
            name: "video_summary".into(),
            arguments: serde_json::json!({"url": "https://youtu.be/abc123"}),
            priority: 0,
        };
        let r1 = tool.execute(&call, &ctx()).await;
        let r2 = tool.execute(&call, &ctx()).await;
        assert!(r1.success && r2.success);
        assert_eq!(tool.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_entry_is_refetched() {
        let tool = VideoSummaryTool::with_ttl(
            CountingBackend {
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(10),
        );
        let call = ToolCall {
            task_id: "t1".into(),
            name: "video_summary".into(),
            arguments: serde_json::json!({"url": "https://youtu.be/abc123"}),
            priority: 0,
        };
        tool.execute(&call, &ctx()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        tool.execute(&call, &ctx()).await;
        assert_eq!(tool.backend.calls.load(Ordering::SeqCst), 2);
    }
}

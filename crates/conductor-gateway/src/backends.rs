//! Concrete tool backends. `WebSearchTool`/`VideoSummaryTool` are left
//! generic over a backend trait by `conductor-tools` precisely so this
//! wiring crate can supply the real API client without the tool crate
//! itself depending on any particular search/summary provider.

use std::sync::Arc;

use conductor_llm::provider::Role as MessageRole;
use conductor_llm::{LlmGateway, Message, Role as GatewayRole, RoleRequest};
use conductor_tools::{SearchBackend, SummaryBackend};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Brave Search API (`BRAVE_API_KEY`). Picked over a scraped HTML search
/// since it returns structured results with titles/snippets directly.
pub struct BraveSearchBackend {
    api_key: String,
}

impl BraveSearchBackend {
    pub fn from_env() -> Option<Self> {
        std::env::var("BRAVE_API_KEY").ok().map(|api_key| Self { api_key })
    }
}

#[derive(Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    description: String,
}

#[async_trait::async_trait]
impl SearchBackend for BraveSearchBackend {
    async fn search(&self, query: &str, http: &reqwest::Client) -> Result<Vec<conductor_core::types::Source>, String> {
        let resp = http
            .get("https://api.search.brave.com/res/v1/web/search")
            .query(&[("q", query)])
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("Brave Search returned {}", resp.status()));
        }

        let parsed: BraveResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| conductor_core::types::Source { title: r.title, url: r.url, snippet: r.description })
            .collect())
    }
}

/// Summarizes a video by fetching its oEmbed metadata (title/author — no
/// API key required, no transcript access in this stack) and asking the
/// `progress_blurb`-adjacent reflector role to turn that into a short note.
/// Good enough to confirm "yes, this is the video about X", not a full
/// transcript summary.
pub struct OembedSummaryBackend {
    gateway: Arc<LlmGateway>,
}

impl OembedSummaryBackend {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[derive(Deserialize)]
struct OembedResponse {
    title: String,
    author_name: String,
}

#[async_trait::async_trait]
impl SummaryBackend for OembedSummaryBackend {
    async fn summarize(&self, video_id: &str, http: &reqwest::Client) -> Result<String, String> {
        let url = format!("https://www.youtube.com/oembed?url=https://youtu.be/{video_id}&format=json");
        let resp = http.get(&url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("oEmbed lookup returned {}", resp.status()));
        }
        let meta: OembedResponse = resp.json().await.map_err(|e| e.to_string())?;

        let prompt = format!(
            "A user shared a video titled \"{}\" by {}. Write one sentence describing what it's likely about.",
            meta.title, meta.author_name
        );
        let role_request = RoleRequest {
            system: "You write a single, concise sentence. No preamble.".to_string(),
            messages: vec![Message { role: MessageRole::User, content: prompt }],
            raw_messages: None,
            tools: vec![],
        };

        match self.gateway.call(GatewayRole::Reflector, role_request, &CancellationToken::new()).await {
            Ok(response) => Ok(format!("{} — {}", meta.title, response.content)),
            Err(e) => {
                warn!(error = %e, "video summary LLM call failed, falling back to title only");
                Ok(meta.title)
            }
        }
    }
}

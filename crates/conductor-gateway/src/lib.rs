//! Wiring shared by both entrypoints (`main.rs`'s Discord transport and
//! `bin/tester.rs`'s interactive REPL): load config, construct every
//! library crate's runtime pieces, and assemble one `SessionRunner`.

mod backends;
mod emoji_reply;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use conductor_bus::BlurbGenerator;
use conductor_core::Config;
use conductor_llm::{AnthropicProvider, GeminiProvider, LlmGateway, LlmProvider};
use conductor_media::EmojiRegistry;
use conductor_scheduler::Scheduler;
use conductor_session::{ChannelMessageCache, SessionContext, SessionRunner};
use conductor_tools::{ReminderSetterTool, ToolContext, ToolRegistry, VideoSummaryTool, WebSearchTool};
use conductor_trend::TrendEngine;
use tracing::{info, warn};

pub use conductor_discord::{DiscordConfig, DiscordReminderDelivery};

/// Everything a running process needs, independent of which transport
/// (`conductor-discord`, the tester) is driving it.
pub struct System {
    pub config: Config,
    pub runner: Arc<SessionRunner>,
    pub scheduler: Scheduler,
    pub http: Arc<serenity::http::Http>,
}

/// Build every library crate's runtime object from a loaded `Config` and
/// assemble the `SessionRunner` both entrypoints drive. `discord_token` is
/// only needed for reminder delivery (a REST `Http` client, not a gateway
/// connection) — the tester passes an empty token and just never fires
/// reminders through it.
pub async fn build_system(config_path: &str, discord_token: String) -> anyhow::Result<System> {
    let config = Config::load(config_path).context("loading config")?;

    let llm = Arc::new(build_llm_gateway(&config)?);

    let http_client = reqwest::Client::new();
    let tool_ctx = ToolContext {
        http: http_client.clone(),
        timezone: config
            .system
            .timezone
            .parse::<chrono_tz::Tz>()
            .unwrap_or(chrono_tz::UTC),
    };
    let tools = Arc::new(build_tool_registry(&config, llm.clone())?);

    let emoji_registry = Arc::new(EmojiRegistry::new());

    let blurb = build_blurb_generator(&config, llm.clone());

    let available_personas = list_personas(config.prompt_system.persona.persona_directory.as_deref());

    let collect_limits = conductor_core::CollectLimits {
        max_text_chars: config.discord.limits.max_text,
        max_images: config.discord.limits.max_images,
        max_history_messages: config.discord.limits.max_messages,
        max_animated_frames: config.discord.input_media.max_animated_frames,
        ..Default::default()
    };

    let mut progress_configs = HashMap::new();
    progress_configs.insert("discord".to_string(), config.progress.get("discord").cloned().unwrap_or_default());

    let session_ctx = SessionContext {
        llm: llm.clone(),
        tools,
        tool_ctx,
        behavior: config.agent.behavior.clone(),
        streaming: config.streaming.clone(),
        persona: config.prompt_system.persona.clone(),
        available_personas,
        emoji_registry: emoji_registry.clone(),
        progress_configs,
        blurb,
        access_control: config.access_control.clone(),
        collect_limits,
    };

    let http = Arc::new(serenity::http::Http::new(&discord_token));
    let reminder_delivery = Arc::new(DiscordReminderDelivery::new(Arc::clone(&http), emoji_registry.clone()));
    let scheduler = Scheduler::new(config.reminder.clone(), reminder_delivery.clone()).context("starting scheduler")?;

    let trend = if config.trend_following.enabled {
        let emoji_generator = Arc::new(emoji_reply::LlmEmojiReplyGenerator::new(llm.clone()));
        Some(Arc::new(TrendEngine::new(config.trend_following.clone(), Some(emoji_generator))))
    } else {
        None
    };

    let message_cache = ChannelMessageCache::new(Duration::from_secs(600), 20);

    let runner = Arc::new(SessionRunner::new(session_ctx, scheduler.clone(), trend, message_cache));
    reminder_delivery.bind_runner(runner.clone());

    Ok(System { config, runner, scheduler, http })
}

fn build_llm_gateway(config: &Config) -> anyhow::Result<LlmGateway> {
    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

    match AnthropicProvider::from_env() {
        Ok(p) => {
            providers.insert("anthropic".to_string(), Arc::new(p));
        }
        Err(e) => info!(error = %e, "Anthropic provider unavailable"),
    }
    match GeminiProvider::from_env() {
        Ok(p) => {
            providers.insert("gemini".to_string(), Arc::new(p));
        }
        Err(e) => info!(error = %e, "Gemini provider unavailable"),
    }

    if providers.is_empty() {
        bail!("no LLM provider credentials found (set ANTHROPIC_API_KEY and/or GEMINI_API_KEY)");
    }

    Ok(LlmGateway::new(providers, config.llm.models.clone(), config.llm.retry.clone()))
}

fn build_tool_registry(config: &Config, llm: Arc<LlmGateway>) -> anyhow::Result<ToolRegistry> {
    let mut tools: Vec<Arc<dyn conductor_tools::Tool>> = vec![Arc::new(ReminderSetterTool)];

    let web_search_enabled = config.agent.tools.get("web_search").map(|g| g.enabled).unwrap_or(true);

    match backends::BraveSearchBackend::from_env() {
        Some(backend) => tools.push(Arc::new(WebSearchTool::new(backend))),
        // §4.9: a tool left enabled with no credentials is a config error,
        // not a silent degradation — only an explicit `enabled: false` may
        // skip it.
        None if web_search_enabled => {
            bail!("web_search tool is enabled but BRAVE_API_KEY is not set")
        }
        None => info!("web_search tool disabled, BRAVE_API_KEY not set"),
    }

    tools.push(Arc::new(VideoSummaryTool::new(backends::OembedSummaryBackend::new(llm))));

    Ok(ToolRegistry::new(tools, config.agent.tools.clone()))
}

fn build_blurb_generator(config: &Config, llm: Arc<LlmGateway>) -> Option<Arc<BlurbGenerator>> {
    let discord_progress = config.progress.get("discord")?;
    if !discord_progress.auto_generate_messages {
        return None;
    }
    Some(Arc::new(BlurbGenerator::new(llm, true, discord_progress.messages.clone())))
}

/// List persona names from a directory of persona files (one file per
/// persona, named `<persona>.md` or similar — only the file stem matters).
/// Loading persona *content* happens wherever the graph renders the system
/// prompt; this only enumerates names for `PersonaConfig.random_selection`.
fn list_personas(directory: Option<&str>) -> Vec<String> {
    let Some(dir) = directory else { return Vec::new() };
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(directory = %dir, "persona directory not readable, no personas available");
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect()
}

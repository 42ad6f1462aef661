//! This transport's own config section — bot token, mention/DM gating,
//! presence, and the knobs `conductor-core::config::DiscordInputConfig`
//! doesn't own (that one shapes `collect()`'s size budgets; this one shapes
//! how the bot behaves on the gateway). Loaded from the same YAML file
//! under a `discord_bot` key so it doesn't collide with the core crate's
//! `discord` key.

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{DiscordError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    /// Read from the `DISCORD_BOT_TOKEN` env var at startup if this is
    /// left empty — never logged, never round-tripped through `Debug`.
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub require_mention: bool,
    #[serde(default = "default_true")]
    pub dm_allowed: bool,
    #[serde(default)]
    pub ack_reactions: bool,
    #[serde(default)]
    pub auto_thread: bool,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            require_mention: false,
            dm_allowed: true,
            ack_reactions: false,
            auto_thread: false,
            status: default_status(),
            activity_name: None,
            activity_type: None,
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_status() -> String {
    "online".to_string()
}
fn default_max_attachment_bytes() -> u64 {
    8 * 1024 * 1024
}

impl DiscordConfig {
    pub fn load(path: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Yaml::file(path).nested())
            .merge(Env::prefixed("CONDUCTOR_DISCORD_"));
        let mut config: DiscordConfig = figment
            .select("discord_bot")
            .extract()
            .map_err(|e| DiscordError::Config(e.to_string()))?;

        if config.bot_token.is_empty() {
            config.bot_token = std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default();
        }
        if config.bot_token.is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_dms_and_disables_mention_gating() {
        let config = DiscordConfig::default();
        assert!(config.dm_allowed);
        assert!(!config.require_mention);
    }
}

//! Config surface (C9) — strongly-typed, strictly validated configuration.
//!
//! Loaded from a YAML file merged with `CONDUCTOR_`-prefixed environment
//! overrides via `figment`. Every struct is `deny_unknown_fields` so an
//! unrecognized key is a load-time error, not a silently ignored typo.
//! Secrets (LLM API keys) are intentionally absent from this struct — they
//! are read straight from the environment by `conductor-llm`'s provider
//! constructors per §6.

use std::collections::HashMap;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub progress: HashMap<String, TransportProgressConfig>,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub trend_following: TrendFollowingConfig,
    #[serde(default)]
    pub discord: DiscordInputConfig,
    #[serde(default)]
    pub prompt_system: PromptSystemConfig,
    #[serde(default)]
    pub access_control: AccessControlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub behavior: AgentBehaviorConfig,
    #[serde(default)]
    pub tools: HashMap<String, ToolGatingConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            behavior: AgentBehaviorConfig::default(),
            tools: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentBehaviorConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "default_timeout_per_round")]
    pub timeout_per_round_secs: u64,
    #[serde(default = "bool_true")]
    pub enable_reflection: bool,
}

impl Default for AgentBehaviorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            timeout_per_round_secs: default_timeout_per_round(),
            enable_reflection: true,
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    3
}
fn default_timeout_per_round() -> u64 {
    30
}
fn bool_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolGatingConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmRoleConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmModelsConfig {
    pub planner: LlmRoleConfig,
    pub finalizer: LlmRoleConfig,
    pub reflector: LlmRoleConfig,
    pub progress_blurb: LlmRoleConfig,
}

/// Backoff-retry policy for `TransientNetwork`/`RateLimited` gateway
/// failures (§7). Applies uniformly to every role; a role-specific policy
/// isn't named anywhere in the spec's config table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmRetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for LlmRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    pub models: LlmModelsConfig,
    #[serde(default)]
    pub retry: LlmRetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            retry: LlmRetryConfig::default(),
            models: LlmModelsConfig {
                planner: LlmRoleConfig {
                    model: "claude-sonnet-4-6".into(),
                    temperature: 0.2,
                    max_output_tokens: 2048,
                },
                finalizer: LlmRoleConfig {
                    model: "claude-sonnet-4-6".into(),
                    temperature: 0.7,
                    max_output_tokens: 4096,
                },
                reflector: LlmRoleConfig {
                    model: "claude-haiku-4-6".into(),
                    temperature: 0.0,
                    max_output_tokens: 256,
                },
                progress_blurb: LlmRoleConfig {
                    model: "claude-haiku-4-6".into(),
                    temperature: 0.8,
                    max_output_tokens: 20,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub min_content_length: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_content_length: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportProgressConfig {
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default)]
    pub use_embeds: bool,
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
    #[serde(default)]
    pub auto_generate_messages: bool,
    #[serde(default)]
    pub messages: HashMap<String, String>,
    /// Streaming chunks are buffered per-observer until this many characters
    /// accumulate, the chunk is final, or `update_interval_ms` has elapsed.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

fn default_update_interval_ms() -> u64 {
    500
}
fn default_cleanup_delay_secs() -> u64 {
    5
}
fn default_max_chunk_chars() -> usize {
    400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_persistence_file")]
    pub persistence_file: String,
    #[serde(default = "default_max_reminders_per_user")]
    pub max_reminders_per_user: u32,
    #[serde(default)]
    pub cleanup_expired_events: bool,
    /// Events whose `fire_at` is this far in the past at startup still fire
    /// immediately; older ones are dropped. 0 (default) means "never drop,
    /// fire everything overdue right away".
    #[serde(default)]
    pub startup_grace_window_secs: u64,
    /// Exponential-backoff retry ceiling for a callback that fails
    /// transiently; the event is dropped once exhausted.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persistence_file: default_persistence_file(),
            max_reminders_per_user: default_max_reminders_per_user(),
            cleanup_expired_events: false,
            startup_grace_window_secs: 0,
            max_delivery_attempts: default_max_delivery_attempts(),
        }
    }
}

fn default_persistence_file() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.conductor/reminders.json")
}
fn default_max_delivery_attempts() -> u32 {
    5
}
fn default_max_reminders_per_user() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrendFollowingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_channels: Vec<String>,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_reaction_threshold")]
    pub reaction_threshold: u32,
    #[serde(default = "default_content_threshold")]
    pub content_threshold: u32,
    #[serde(default = "default_emoji_threshold")]
    pub emoji_threshold: u32,
    #[serde(default)]
    pub enable_probabilistic: bool,
    #[serde(default = "default_base_probability")]
    pub base_probability: f64,
    #[serde(default = "default_probability_boost_factor")]
    pub probability_boost_factor: f64,
    #[serde(default = "default_max_probability")]
    pub max_probability: f64,
}

impl Default for TrendFollowingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_channels: Vec::new(),
            cooldown_seconds: default_cooldown_seconds(),
            reaction_threshold: default_reaction_threshold(),
            content_threshold: default_content_threshold(),
            emoji_threshold: default_emoji_threshold(),
            enable_probabilistic: false,
            base_probability: default_base_probability(),
            probability_boost_factor: default_probability_boost_factor(),
            max_probability: default_max_probability(),
        }
    }
}

fn default_cooldown_seconds() -> u64 {
    60
}
fn default_reaction_threshold() -> u32 {
    3
}
fn default_content_threshold() -> u32 {
    2
}
fn default_emoji_threshold() -> u32 {
    3
}
fn default_base_probability() -> f64 {
    0.5
}
fn default_probability_boost_factor() -> f64 {
    0.15
}
fn default_max_probability() -> f64 {
    0.95
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordLimitsConfig {
    #[serde(default = "default_max_text")]
    pub max_text: usize,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for DiscordLimitsConfig {
    fn default() -> Self {
        Self {
            max_text: default_max_text(),
            max_images: default_max_images(),
            max_messages: default_max_messages(),
        }
    }
}

fn default_max_text() -> usize {
    24_000
}
fn default_max_images() -> usize {
    8
}
fn default_max_messages() -> usize {
    40
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputMediaConfig {
    #[serde(default = "default_max_animated_frames")]
    pub max_animated_frames: usize,
}

impl Default for InputMediaConfig {
    fn default() -> Self {
        Self {
            max_animated_frames: default_max_animated_frames(),
        }
    }
}

fn default_max_animated_frames() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordInputConfig {
    #[serde(default)]
    pub limits: DiscordLimitsConfig,
    #[serde(default)]
    pub input_media: InputMediaConfig,
}

impl Default for DiscordInputConfig {
    fn default() -> Self {
        Self {
            limits: DiscordLimitsConfig::default(),
            input_media: InputMediaConfig::default(),
        }
    }
}

/// Permission gating for C10 (§4.10 step 1). Block-lists win over
/// allow-lists; an empty allow-list means "everyone/everything allowed",
/// matching the same convention as `trend_following.allowed_channels`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessControlConfig {
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default)]
    pub allow_dms: bool,
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub blocked_users: Vec<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub blocked_roles: Vec<String>,
    #[serde(default)]
    pub allowed_channels: Vec<String>,
    #[serde(default)]
    pub blocked_channels: Vec<String>,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            allow_dms: true,
            allowed_users: Vec::new(),
            blocked_users: Vec::new(),
            allowed_roles: Vec::new(),
            blocked_roles: Vec::new(),
            allowed_channels: Vec::new(),
            blocked_channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonaConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub random_selection: bool,
    pub default_persona: Option<String>,
    pub persona_directory: Option<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            random_selection: false,
            default_persona: None,
            persona_directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptSystemConfig {
    #[serde(default)]
    pub persona: PersonaConfig,
}

impl Default for PromptSystemConfig {
    fn default() -> Self {
        Self {
            persona: PersonaConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            agent: AgentConfig::default(),
            llm: LlmConfig::default(),
            streaming: StreamingConfig::default(),
            progress: HashMap::new(),
            reminder: ReminderConfig::default(),
            trend_following: TrendFollowingConfig::default(),
            discord: DiscordInputConfig::default(),
            prompt_system: PromptSystemConfig::default(),
            access_control: AccessControlConfig::default(),
        }
    }
}

impl Config {
    /// Load from a YAML file with `CONDUCTOR_`-prefixed env var overrides.
    /// Unknown keys anywhere in the document are a load error (strict mode).
    pub fn load(path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("CONDUCTOR_").split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation beyond what serde already enforces. Per §4.9,
    /// "an enabled tool whose credentials are missing is a configuration
    /// error" — credential checks live in `conductor-tools` (which knows
    /// which env vars each tool needs); this validates the knobs this crate
    /// owns directly.
    pub fn validate(&self) -> Result<()> {
        if self.agent.behavior.timeout_per_round_secs == 0 {
            return Err(CoreError::Config(
                "agent.behavior.timeout_per_round_secs must be > 0".into(),
            ));
        }
        let tf = &self.trend_following;
        if tf.enabled {
            if !(0.0..=1.0).contains(&tf.base_probability) {
                return Err(CoreError::Config(
                    "trend_following.base_probability must be in [0,1]".into(),
                ));
            }
            if !(0.0..=1.0).contains(&tf.max_probability) {
                return Err(CoreError::Config(
                    "trend_following.max_probability must be in [0,1]".into(),
                ));
            }
            if tf.max_probability < tf.base_probability {
                return Err(CoreError::Config(
                    "trend_following.max_probability must be >= base_probability".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_probability_bounds() {
        let mut cfg = Config::default();
        cfg.trend_following.enabled = true;
        cfg.trend_following.base_probability = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_round_timeout() {
        let mut cfg = Config::default();
        cfg.agent.behavior.timeout_per_round_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let yaml = "not_a_real_key: 1\n";
        let result: std::result::Result<Config, _> = Figment::new()
            .merge(Yaml::string(yaml))
            .extract();
        assert!(result.is_err());
    }
}

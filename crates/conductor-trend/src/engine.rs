//! Trend-following engine (C7): independent of the main graph, evaluated
//! on every relevant chat event.

use std::sync::Arc;
use std::time::Duration;

use conductor_core::config::TrendFollowingConfig;
use rand::Rng;
use tracing::debug;

use crate::channel::ChannelRegistry;
use crate::gate::{channel_allowed, content_streak, emoji_streak, passes_threshold};
use crate::types::{ChatEvent, EmojiReplyGenerator, ReactionEvent, TrendAction};

const MIN_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 3000;

pub struct TrendEngine {
    config: TrendFollowingConfig,
    channels: ChannelRegistry,
    emoji_generator: Option<Arc<dyn EmojiReplyGenerator>>,
}

impl TrendEngine {
    pub fn new(config: TrendFollowingConfig, emoji_generator: Option<Arc<dyn EmojiReplyGenerator>>) -> Self {
        Self {
            config,
            channels: ChannelRegistry::new(),
            emoji_generator,
        }
    }

    /// Reaction mode: independent of content/emoji, may run concurrently
    /// with either.
    pub async fn evaluate_reaction(&self, channel_id: &str, event: &ReactionEvent) -> Option<TrendAction> {
        if !self.config.enabled || !channel_allowed(channel_id, &self.config) {
            return None;
        }
        if event.bot_already_reacted {
            return None;
        }
        if !self.passes(event.reaction_count, self.config.reaction_threshold) {
            return None;
        }

        let action = TrendAction::RepeatReaction {
            emoji_token: event.emoji_token.clone(),
        };
        self.commit(channel_id, action).await
    }

    /// Content mode has strictly higher priority than emoji mode; this
    /// evaluates both against the same window and returns at most one
    /// action.
    pub async fn evaluate_message_window(&self, channel_id: &str, recent: &[ChatEvent]) -> Option<TrendAction> {
        if !self.config.enabled || !channel_allowed(channel_id, &self.config) {
            return None;
        }

        if let Some(action) = self.evaluate_content(recent) {
            return self.commit(channel_id, action).await;
        }
        if let Some(action) = self.evaluate_emoji(recent).await {
            return self.commit(channel_id, action).await;
        }
        None
    }

    fn evaluate_content(&self, recent: &[ChatEvent]) -> Option<TrendAction> {
        let (count, bot_participated) = content_streak(recent);
        if bot_participated {
            return None;
        }
        if !self.passes(count, self.config.content_threshold) {
            return None;
        }
        let content = recent.last()?.normalized_content.clone();
        Some(TrendAction::RepeatContent { content })
    }

    async fn evaluate_emoji(&self, recent: &[ChatEvent]) -> Option<TrendAction> {
        let (count, bot_participated) = emoji_streak(recent);
        if bot_participated {
            return None;
        }
        if !self.passes(count, self.config.emoji_threshold) {
            return None;
        }
        let generator = self.emoji_generator.as_ref()?;
        let text = generator.generate().await?;
        Some(TrendAction::EmojiOnlyReply { text })
    }

    fn passes(&self, count: u32, threshold: u32) -> bool {
        let roll = if self.config.enable_probabilistic {
            rand::thread_rng().gen_range(0.0..1.0)
        } else {
            0.0
        };
        passes_threshold(count, threshold, &self.config, roll)
    }

    /// Reserve the channel's cooldown slot, sleep the randomized emission
    /// delay, then re-check the reservation is still ours before handing
    /// the action back for the caller to actually send.
    async fn commit(&self, channel_id: &str, action: TrendAction) -> Option<TrendAction> {
        let cooldown = Duration::from_secs(self.config.cooldown_seconds);
        let reservation = self.channels.try_reserve(channel_id, cooldown).await?;

        let delay_ms = rand::thread_rng().gen_range(MIN_DELAY_MS..=MAX_DELAY_MS);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if !reservation.still_valid().await {
            debug!(channel_id, "trend reservation superseded during delayed emission, aborting");
            return None;
        }
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatEvent;

    fn cfg() -> TrendFollowingConfig {
        TrendFollowingConfig {
            enabled: true,
            allowed_channels: vec![],
            cooldown_seconds: 0,
            reaction_threshold: 3,
            content_threshold: 2,
            emoji_threshold: 3,
            enable_probabilistic: false,
            base_probability: 0.5,
            probability_boost_factor: 0.15,
            max_probability: 0.95,
        }
    }

    fn msg(content: &str, bot: bool) -> ChatEvent {
        ChatEvent {
            message_id: "m".into(),
            is_bot_author: bot,
            normalized_content: content.into(),
            is_emoji_only: false,
        }
    }

    #[tokio::test]
    async fn content_trend_fires_once_threshold_reached() {
        let engine = TrendEngine::new(cfg(), None);
        let recent = vec![msg("yo", false), msg("yo", false)];
        let action = engine.evaluate_message_window("c1", &recent).await;
        assert_eq!(
            action,
            Some(TrendAction::RepeatContent { content: "yo".into() })
        );
    }

    #[tokio::test]
    async fn bot_participation_in_streak_suppresses_further_action() {
        let engine = TrendEngine::new(cfg(), None);
        let recent = vec![msg("yo", false), msg("yo", true)];
        let action = engine.evaluate_message_window("c1", &recent).await;
        assert_eq!(action, None);
    }

    #[tokio::test]
    async fn disabled_engine_never_fires() {
        let mut config = cfg();
        config.enabled = false;
        let engine = TrendEngine::new(config, None);
        let recent = vec![msg("yo", false), msg("yo", false)];
        assert_eq!(engine.evaluate_message_window("c1", &recent).await, None);
    }

    #[tokio::test]
    async fn channel_not_in_allow_list_is_suppressed() {
        let mut config = cfg();
        config.allowed_channels = vec!["other".into()];
        let engine = TrendEngine::new(config, None);
        let recent = vec![msg("yo", false), msg("yo", false)];
        assert_eq!(engine.evaluate_message_window("c1", &recent).await, None);
    }

    #[tokio::test]
    async fn reaction_already_made_by_bot_is_suppressed() {
        let engine = TrendEngine::new(cfg(), None);
        let event = ReactionEvent {
            message_id: "m".into(),
            emoji_token: ":wave:".into(),
            reaction_count: 5,
            bot_already_reacted: true,
        };
        assert_eq!(engine.evaluate_reaction("c1", &event).await, None);
    }
}

//! Pure decision logic: streak counting and the probabilistic gate. Kept
//! free of async/mutex/time so the numeric scenarios can be asserted
//! directly.

use conductor_core::config::TrendFollowingConfig;

use crate::types::ChatEvent;

/// Count how many of the most recent messages share the same normalized
/// content as the very last one, and whether the bot already posted
/// within that streak (the bot-loop guard).
///
/// Returns `(streak_len, bot_participated)`. An empty window is a streak
/// of zero.
pub fn content_streak(recent: &[ChatEvent]) -> (u32, bool) {
    let Some(last) = recent.last() else {
        return (0, false);
    };
    let mut count = 0u32;
    let mut bot_participated = false;
    for event in recent.iter().rev() {
        if event.normalized_content != last.normalized_content {
            break;
        }
        count += 1;
        bot_participated |= event.is_bot_author;
    }
    (count, bot_participated)
}

/// Count how many of the most recent messages are emoji-only, and whether
/// the bot already posted within that streak.
pub fn emoji_streak(recent: &[ChatEvent]) -> (u32, bool) {
    let mut count = 0u32;
    let mut bot_participated = false;
    for event in recent.iter().rev() {
        if !event.is_emoji_only {
            break;
        }
        count += 1;
        bot_participated |= event.is_bot_author;
    }
    (count, bot_participated)
}

/// `p = min(max_probability, base_probability + max(0, count - threshold) * boost_factor)`.
pub fn probability(count: u32, threshold: u32, cfg: &TrendFollowingConfig) -> f64 {
    let excess = count.saturating_sub(threshold) as f64;
    let p = cfg.base_probability + excess * cfg.probability_boost_factor;
    p.min(cfg.max_probability)
}

/// Whether `count` clears the threshold at all, gated either
/// probabilistically or as a hard cutoff per `enable_probabilistic`.
pub fn passes_threshold(count: u32, threshold: u32, cfg: &TrendFollowingConfig, roll: f64) -> bool {
    if count < threshold {
        return false;
    }
    if !cfg.enable_probabilistic {
        return true;
    }
    roll < probability(count, threshold, cfg)
}

pub fn channel_allowed(channel_id: &str, cfg: &TrendFollowingConfig) -> bool {
    cfg.allowed_channels.is_empty() || cfg.allowed_channels.iter().any(|c| c == channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base: f64, boost: f64, max: f64) -> TrendFollowingConfig {
        TrendFollowingConfig {
            enabled: true,
            allowed_channels: vec![],
            cooldown_seconds: 30,
            reaction_threshold: 3,
            content_threshold: 2,
            emoji_threshold: 3,
            enable_probabilistic: true,
            base_probability: base,
            probability_boost_factor: boost,
            max_probability: max,
        }
    }

    fn msg(content: &str) -> ChatEvent {
        ChatEvent {
            message_id: "m".into(),
            is_bot_author: false,
            normalized_content: content.into(),
            is_emoji_only: false,
        }
    }

    #[test]
    fn scenario_six_probability_at_threshold_is_base() {
        let cfg = cfg(0.5, 0.15, 0.95);
        assert_eq!(probability(2, 2, &cfg), 0.5);
    }

    #[test]
    fn scenario_six_probability_after_two_excess_is_0_80() {
        let cfg = cfg(0.5, 0.15, 0.95);
        assert!((probability(4, 2, &cfg) - 0.80).abs() < 1e-9);
    }

    #[test]
    fn scenario_six_probability_caps_at_max() {
        let cfg = cfg(0.5, 0.15, 0.95);
        assert_eq!(probability(9, 2, &cfg), 0.95);
    }

    #[test]
    fn content_streak_counts_trailing_identical_messages() {
        let recent = vec![msg("a"), msg("b"), msg("b"), msg("b")];
        let (count, bot) = content_streak(&recent);
        assert_eq!(count, 3);
        assert!(!bot);
    }

    #[test]
    fn content_streak_detects_bot_participation() {
        let mut recent = vec![msg("b"), msg("b")];
        recent[0].is_bot_author = true;
        let (count, bot) = content_streak(&recent);
        assert_eq!(count, 2);
        assert!(bot);
    }

    #[test]
    fn empty_allowed_channels_allows_everything() {
        let cfg = cfg(0.5, 0.15, 0.95);
        assert!(channel_allowed("any-channel", &cfg));
    }

    #[test]
    fn below_threshold_never_passes_regardless_of_roll() {
        let cfg = cfg(0.5, 0.15, 0.95);
        assert!(!passes_threshold(1, 2, &cfg, 0.0));
    }

    #[test]
    fn non_probabilistic_mode_is_a_hard_cutoff() {
        let mut cfg = cfg(0.5, 0.15, 0.95);
        cfg.enable_probabilistic = false;
        assert!(passes_threshold(2, 2, &cfg, 0.999));
    }
}

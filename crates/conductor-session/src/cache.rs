//! Per-channel message cache (§4.10 step 8) feeding the trend-following
//! engine's windowed checks. One bounded deque per channel, evicted by age
//! or size on every insert — deliberately not a shared TTL map like the
//! tool cache, since this needs ordered recent-window semantics rather than
//! point lookups.

use std::time::{Duration, Instant};

use conductor_trend::ChatEvent;
use dashmap::DashMap;

struct Entry {
    event: ChatEvent,
    inserted_at: Instant,
}

pub struct ChannelMessageCache {
    channels: DashMap<String, Vec<Entry>>,
    max_age: Duration,
    max_size: usize,
}

impl ChannelMessageCache {
    pub fn new(max_age: Duration, max_size: usize) -> Self {
        Self {
            channels: DashMap::new(),
            max_age,
            max_size,
        }
    }

    /// Record a chat event and evict anything too old or beyond the size
    /// cap (oldest first) in the same pass.
    pub fn push(&self, channel_id: &str, event: ChatEvent) {
        let mut entries = self.channels.entry(channel_id.to_string()).or_default();
        let now = Instant::now();
        entries.retain(|e| now.duration_since(e.inserted_at) < self.max_age);
        entries.push(Entry {
            event,
            inserted_at: now,
        });
        if entries.len() > self.max_size {
            let drop_count = entries.len() - self.max_size;
            entries.drain(0..drop_count);
        }
    }

    /// The current window for a channel, oldest first, with expired entries
    /// dropped first.
    pub fn window(&self, channel_id: &str) -> Vec<ChatEvent> {
        let Some(mut entries) = self.channels.get_mut(channel_id) else {
            return Vec::new();
        };
        let now = Instant::now();
        entries.retain(|e| now.duration_since(e.inserted_at) < self.max_age);
        entries.iter().map(|e| e.event.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content: &str) -> ChatEvent {
        ChatEvent {
            message_id: content.to_string(),
            is_bot_author: false,
            normalized_content: content.to_string(),
            is_emoji_only: false,
        }
    }

    #[test]
    fn window_is_empty_for_unknown_channel() {
        let cache = ChannelMessageCache::new(Duration::from_secs(60), 10);
        assert!(cache.window("c1").is_empty());
    }

    #[test]
    fn push_then_window_returns_in_insertion_order() {
        let cache = ChannelMessageCache::new(Duration::from_secs(60), 10);
        cache.push("c1", event("a"));
        cache.push("c1", event("b"));
        let window = cache.window("c1");
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].normalized_content, "a");
        assert_eq!(window[1].normalized_content, "b");
    }

    #[test]
    fn size_cap_evicts_oldest_first() {
        let cache = ChannelMessageCache::new(Duration::from_secs(60), 2);
        cache.push("c1", event("a"));
        cache.push("c1", event("b"));
        cache.push("c1", event("c"));
        let window = cache.window("c1");
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].normalized_content, "b");
        assert_eq!(window[1].normalized_content, "c");
    }

    #[test]
    fn channels_are_independent() {
        let cache = ChannelMessageCache::new(Duration::from_secs(60), 10);
        cache.push("c1", event("a"));
        assert!(cache.window("c2").is_empty());
    }
}

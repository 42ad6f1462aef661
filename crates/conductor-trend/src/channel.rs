//! Per-channel serialization: one mutex and one `last_fire_at` clock per
//! channel, looked up lock-free and locked only for the duration of a
//! single trend decision (§5 "Shared resources").

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

pub struct ChannelSlot {
    pub last_fire_at: Option<Instant>,
}

/// Keyed by channel id; entries are created lazily and never removed
/// (channel churn in a Discord-scale deployment is small enough that this
/// doesn't need eviction — unlike the message cache C10 owns).
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<Mutex<ChannelSlot>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, channel_id: &str) -> Arc<Mutex<ChannelSlot>> {
        self.channels
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ChannelSlot { last_fire_at: None })))
            .clone()
    }

    /// Acquire the channel's lock and reserve a fire slot if cooldown has
    /// elapsed. Returns `None` (abort cleanly) if still cooling down by the
    /// time the lock was acquired.
    pub async fn try_reserve(&self, channel_id: &str, cooldown: Duration) -> Option<Reservation> {
        let slot = self.slot(channel_id);
        let mut guard = slot.lock().await;
        if let Some(last) = guard.last_fire_at {
            if last.elapsed() < cooldown {
                return None;
            }
        }
        let now = Instant::now();
        guard.last_fire_at = Some(now);
        drop(guard);
        Some(Reservation { slot, stamp: now })
    }
}

/// A provisional claim on a channel's next fire slot, made before the
/// delayed-emission sleep. `still_valid` re-checks that nothing clobbered
/// the reservation in the meantime before the caller actually emits.
pub struct Reservation {
    slot: Arc<Mutex<ChannelSlot>>,
    stamp: Instant,
}

impl Reservation {
    pub async fn still_valid(&self) -> bool {
        let guard = self.slot.lock().await;
        guard.last_fire_at == Some(self.stamp)
    }
}

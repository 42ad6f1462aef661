use chrono::{DateTime, Utc};
use conductor_core::types::ReminderDetails;
use serde::{Deserialize, Serialize};

/// Wire shape of one event, exactly the fields named in the persistence
/// format: `{id, content, fire_at, channel_ref, user_ref, created_at}`.
/// Unknown extra fields are tolerated on read (forward-compat); all of
/// these are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEvent {
    pub id: String,
    pub content: String,
    pub fire_at: DateTime<Utc>,
    pub channel_ref: String,
    pub user_ref: String,
    pub created_at: DateTime<Utc>,
    /// Set once delivery is exhausted or the event expired past the
    /// startup grace window and `reminder.cleanup_expired_events` is
    /// `false`. A terminal event is kept on disk for visibility but never
    /// polled again.
    #[serde(default)]
    pub terminal: bool,
}

impl PersistedEvent {
    pub fn new(id: String, details: &ReminderDetails) -> Self {
        Self {
            id,
            content: details.content.clone(),
            fire_at: details.fire_at,
            channel_ref: details.channel_ref.clone(),
            user_ref: details.user_ref.clone(),
            created_at: details.created_at,
            terminal: false,
        }
    }

    pub fn from_scheduled(r: &ScheduledReminder) -> Self {
        let mut event = Self::new(r.id.clone(), &r.details);
        event.terminal = r.terminal;
        event
    }

    pub fn to_reminder_details(&self) -> ReminderDetails {
        ReminderDetails {
            content: self.content.clone(),
            fire_at: self.fire_at,
            channel_ref: self.channel_ref.clone(),
            user_ref: self.user_ref.clone(),
            created_at: self.created_at,
        }
    }
}

/// Root of `reminder.persistence_file`: `{"version": 1, "events": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceFile {
    pub version: u32,
    pub events: Vec<PersistedEvent>,
}

impl Default for PersistenceFile {
    fn default() -> Self {
        Self {
            version: 1,
            events: Vec::new(),
        }
    }
}

/// In-memory view of one pending reminder: the persisted fields plus
/// runtime-only retry bookkeeping that never hits disk.
#[derive(Debug, Clone)]
pub struct ScheduledReminder {
    pub id: String,
    pub details: ReminderDetails,
    pub attempts: u32,
    pub firing: bool,
    /// When this reminder is next eligible to fire. Starts at
    /// `details.fire_at`; bumped forward by exponential backoff after a
    /// transient callback failure.
    pub next_attempt_at: DateTime<Utc>,
    /// Delivery is exhausted (or the event expired at startup) and
    /// `cleanup_expired_events` kept it around instead of dropping it.
    /// Terminal events are excluded from polling.
    pub terminal: bool,
}

impl ScheduledReminder {
    pub fn from_persisted(p: &PersistedEvent) -> Self {
        Self {
            id: p.id.clone(),
            details: p.to_reminder_details(),
            attempts: 0,
            firing: false,
            next_attempt_at: p.fire_at,
            terminal: p.terminal,
        }
    }
}

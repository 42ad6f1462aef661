//! Durable reminder scheduler (C6): persists pending reminders to a flat
//! JSON file, polls once a second, and fires an opaque callback at
//! `fire_at` with at-most-once delivery and bounded retry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_core::config::ReminderConfig;
use conductor_core::types::ReminderDetails;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::store::Store;
use crate::types::{PersistedEvent, PersistenceFile, ScheduledReminder};

/// C10's hook into the scheduler. The scheduler never re-enters the graph
/// itself — it only knows whether delivery succeeded or should be retried.
#[async_trait]
pub trait ReminderCallback: Send + Sync {
    /// Return `true` on successful delivery (event is removed), `false` on
    /// a transient failure (event is retried with backoff up to the
    /// configured attempt ceiling).
    async fn fire(&self, reminder: &ScheduledReminder) -> bool;
}

struct Inner {
    store: Store,
    state: Mutex<Vec<ScheduledReminder>>,
    config: ReminderConfig,
    callback: Arc<dyn ReminderCallback>,
}

/// Shared handle: cloning is cheap (an `Arc` underneath), so C10 can hold
/// one copy to call `schedule`/`cancel` while another copy drives `run`.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Load the persistence file, reconcile against the startup grace
    /// window, and persist the reconciled state back immediately so a
    /// crash between load and the first tick can't resurrect dropped
    /// events.
    pub fn new(config: ReminderConfig, callback: Arc<dyn ReminderCallback>) -> Result<Self> {
        let store = Store::new(config.persistence_file.clone());
        crate::store::cleanup_stray_temp(store.path());
        let file = store.load()?;

        let now = Utc::now();
        let grace = config.startup_grace_window_secs;
        let mut expired = 0usize;
        let kept: Vec<ScheduledReminder> = file
            .events
            .iter()
            .filter_map(|e| {
                let overdue_secs = (now - e.fire_at).num_seconds();
                // grace == 0 means the window is unbounded: every overdue
                // event still fires, just as soon as the engine starts.
                let too_late = grace > 0 && overdue_secs > grace as i64;
                if !too_late {
                    return Some(ScheduledReminder::from_persisted(e));
                }
                expired += 1;
                if config.cleanup_expired_events {
                    None
                } else {
                    let mut reminder = ScheduledReminder::from_persisted(e);
                    reminder.terminal = true;
                    Some(reminder)
                }
            })
            .collect();

        if expired > 0 {
            warn!(expired, cleaned_up = config.cleanup_expired_events, "reminders past the startup grace window");
        }

        let inner = Inner {
            state: Mutex::new(kept),
            store,
            config,
            callback,
        };
        let scheduler = Self { inner: Arc::new(inner) };
        scheduler.persist()?;
        Ok(scheduler)
    }

    /// Schedule a new reminder. Rejects with `QuotaExceeded` if the user is
    /// already at `max_reminders_per_user`.
    pub fn schedule(&self, details: ReminderDetails) -> Result<String> {
        let mut state = self.inner.state.lock().unwrap();
        let count = state.iter().filter(|r| r.details.user_ref == details.user_ref).count();
        if count as u32 >= self.inner.config.max_reminders_per_user {
            return Err(SchedulerError::QuotaExceeded {
                user_ref: details.user_ref.clone(),
            });
        }

        let id = Uuid::now_v7().to_string();
        let reminder = ScheduledReminder {
            id: id.clone(),
            next_attempt_at: details.fire_at,
            details,
            attempts: 0,
            firing: false,
        };
        state.push(reminder);
        drop(state);
        self.persist()?;
        info!(event_id = %id, "reminder scheduled");
        Ok(id)
    }

    /// Cancel a pending reminder before it fires.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        let before = state.len();
        state.retain(|r| r.id != id);
        if state.len() == before {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        drop(state);
        self.persist()
    }

    pub fn list_for_user(&self, user_ref: &str) -> Vec<ScheduledReminder> {
        self.inner
            .state
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.details.user_ref == user_ref)
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().unwrap().len()
    }

    fn persist(&self) -> Result<()> {
        let state = self.inner.state.lock().unwrap();
        let file = PersistenceFile {
            version: 1,
            events: state.iter().map(PersistedEvent::from_scheduled).collect(),
        };
        drop(state);
        self.inner.store.save(&file)
    }

    /// Main polling loop. Runs until `shutdown` is cancelled. Intended to
    /// be driven by exactly one clone of this handle.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("reminder scheduler started");
        let mut tick = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.cancelled() => {
                    info!("reminder scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn poll_once(&self) {
        let now = Utc::now();
        let due: Vec<ScheduledReminder> = {
            let mut state = self.inner.state.lock().unwrap();
            let due_ids: Vec<String> = state
                .iter()
                .filter(|r| !r.firing && !r.terminal && r.next_attempt_at <= now)
                .map(|r| r.id.clone())
                .collect();
            for r in state.iter_mut() {
                if due_ids.contains(&r.id) {
                    r.firing = true;
                }
            }
            state.iter().filter(|r| due_ids.contains(&r.id)).cloned().collect()
        };

        for reminder in due {
            let delivered = self.inner.callback.fire(&reminder).await;
            if delivered {
                self.finish(&reminder.id, true, now);
            } else {
                self.finish(&reminder.id, false, now);
            }
        }

        if !due.is_empty() {
            if let Err(e) = self.persist() {
                warn!(error = %e, "failed to persist reminder state after firing");
            }
        }
    }

    fn finish(&self, id: &str, delivered: bool, now: DateTime<Utc>) {
        let mut state = self.inner.state.lock().unwrap();
        if delivered {
            state.retain(|r| r.id != id);
            return;
        }
        let mut exhausted = false;
        if let Some(r) = state.iter_mut().find(|r| r.id == id) {
            r.attempts += 1;
            r.firing = false;
            if r.attempts >= self.inner.config.max_delivery_attempts {
                exhausted = true;
            } else {
                let backoff_secs = 2u64.saturating_pow(r.attempts.min(10));
                r.next_attempt_at = now + chrono::Duration::seconds(backoff_secs as i64);
            }
        }
        if exhausted {
            if self.inner.config.cleanup_expired_events {
                warn!(event_id = %id, "reminder exhausted delivery retries, dropping");
                state.retain(|r| r.id != id);
            } else {
                warn!(event_id = %id, "reminder exhausted delivery retries, keeping as terminal");
                if let Some(r) = state.iter_mut().find(|r| r.id == id) {
                    r.terminal = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCallback {
        succeed: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReminderCallback for CountingCallback {
        async fn fire(&self, _reminder: &ScheduledReminder) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.succeed
        }
    }

    fn test_config(name: &str) -> ReminderConfig {
        ReminderConfig {
            enabled: true,
            persistence_file: std::env::temp_dir()
                .join(format!("conductor-scheduler-engine-test-{}-{name}.json", std::process::id()))
                .to_string_lossy()
                .into_owned(),
            max_reminders_per_user: 2,
            cleanup_expired_events: false,
            startup_grace_window_secs: 0,
            max_delivery_attempts: 3,
        }
    }

    fn details(user: &str, fire_at: DateTime<Utc>) -> ReminderDetails {
        ReminderDetails {
            content: "stretch".into(),
            fire_at,
            channel_ref: "chan".into(),
            user_ref: user.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn schedule_rejects_once_per_user_cap_is_reached() {
        let callback = Arc::new(CountingCallback {
            succeed: true,
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(test_config("cap"), callback).unwrap();
        let future = Utc::now() + chrono::Duration::minutes(5);
        scheduler.schedule(details("u1", future)).unwrap();
        scheduler.schedule(details("u1", future)).unwrap();
        let err = scheduler.schedule(details("u1", future)).unwrap_err();
        assert!(matches!(err, SchedulerError::QuotaExceeded { .. }));
        let _ = std::fs::remove_file(&scheduler.inner.config.persistence_file);
    }

    #[tokio::test]
    async fn due_reminder_fires_and_is_removed_on_success() {
        let callback = Arc::new(CountingCallback {
            succeed: true,
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(test_config("fire-success"), callback.clone()).unwrap();
        let past = Utc::now() - chrono::Duration::seconds(1);
        scheduler.schedule(details("u1", past)).unwrap();
        scheduler.poll_once().await;
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
        let _ = std::fs::remove_file(&scheduler.inner.config.persistence_file);
    }

    #[tokio::test]
    async fn transient_failure_schedules_a_later_retry_instead_of_dropping() {
        let callback = Arc::new(CountingCallback {
            succeed: false,
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(test_config("retry"), callback.clone()).unwrap();
        let past = Utc::now() - chrono::Duration::seconds(1);
        let id = scheduler.schedule(details("u1", past)).unwrap();
        scheduler.poll_once().await;
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 1);
        let remaining = scheduler.list_for_user("u1");
        let found = remaining.iter().find(|r| r.id == id).unwrap();
        assert_eq!(found.attempts, 1);
        assert!(found.next_attempt_at > Utc::now());
        let _ = std::fs::remove_file(&scheduler.inner.config.persistence_file);
    }

    #[tokio::test]
    async fn exhausted_delivery_is_dropped_when_cleanup_is_configured() {
        let callback = Arc::new(CountingCallback {
            succeed: false,
            calls: AtomicUsize::new(0),
        });
        let mut config = test_config("exhaust-cleanup");
        config.max_delivery_attempts = 1;
        config.cleanup_expired_events = true;
        let scheduler = Scheduler::new(config, callback.clone()).unwrap();
        let past = Utc::now() - chrono::Duration::seconds(1);
        scheduler.schedule(details("u1", past)).unwrap();
        scheduler.poll_once().await;
        assert_eq!(scheduler.pending_count(), 0);
        let _ = std::fs::remove_file(&scheduler.inner.config.persistence_file);
    }

    #[tokio::test]
    async fn exhausted_delivery_is_kept_terminal_when_cleanup_is_not_configured() {
        let callback = Arc::new(CountingCallback {
            succeed: false,
            calls: AtomicUsize::new(0),
        });
        let mut config = test_config("exhaust-keep");
        config.max_delivery_attempts = 1;
        config.cleanup_expired_events = false;
        let scheduler = Scheduler::new(config, callback.clone()).unwrap();
        let past = Utc::now() - chrono::Duration::seconds(1);
        let id = scheduler.schedule(details("u1", past)).unwrap();

        scheduler.poll_once().await;
        assert_eq!(scheduler.pending_count(), 1);
        let remaining = scheduler.list_for_user("u1");
        let found = remaining.iter().find(|r| r.id == id).unwrap();
        assert!(found.terminal);

        // A terminal event never fires again, even once it's "due" by time.
        scheduler.poll_once().await;
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_file(&scheduler.inner.config.persistence_file);
    }
}

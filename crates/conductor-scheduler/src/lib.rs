//! Durable event scheduler (C6): persists reminder side-effects produced by
//! tool calls and re-fires them as an opaque callback at `fire_at`. Reminder
//! scope only — the original source's broader job-scheduling surface
//! (cron expressions, repeating jobs) isn't carried forward; see the
//! reminder-only scoping decision in the project's design notes.

mod engine;
mod error;
mod store;
mod types;

pub use engine::{ReminderCallback, Scheduler};
pub use error::{Result, SchedulerError};
pub use types::{PersistedEvent, PersistenceFile, ScheduledReminder};

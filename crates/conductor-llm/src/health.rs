//! Provider health tracking — passive monitoring based on real request
//! outcomes, not synthetic pings. Rolling 5-minute success/failure window
//! per logical role, so a role that is failing degrades immediately rather
//! than after an explicit probe cycle.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use crate::error::LlmError;

const WINDOW_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Ok,
    Degraded,
    Down,
    RateLimited,
    Unknown,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded => write!(f, "degraded"),
            Self::Down => write!(f, "down"),
            Self::RateLimited => write!(f, "rate-limited"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleHealthEntry {
    pub role: String,
    pub status: ProviderStatus,
    pub last_success_at: Option<i64>,
    pub last_error_at: Option<i64>,
    pub last_error: Option<String>,
    pub avg_latency_ms: u64,
    pub requests_ok: u32,
    pub requests_err: u32,
    pub total_requests: u64,
}

struct InternalEntry {
    window: VecDeque<(Instant, bool, u64)>,
    last_success_at: Option<i64>,
    last_error_at: Option<i64>,
    last_error: Option<String>,
    total_requests: u64,
    override_status: Option<ProviderStatus>,
}

impl InternalEntry {
    fn new() -> Self {
        Self {
            window: VecDeque::new(),
            last_success_at: None,
            last_error_at: None,
            last_error: None,
            total_requests: 0,
            override_status: None,
        }
    }

    fn prune(&mut self) {
        let cutoff = Instant::now() - std::time::Duration::from_secs(WINDOW_SECS);
        while self.window.front().is_some_and(|(t, _, _)| *t < cutoff) {
            self.window.pop_front();
        }
    }

    fn derive_status(&self) -> ProviderStatus {
        if let Some(status) = self.override_status {
            return status;
        }
        if self.window.is_empty() {
            return ProviderStatus::Unknown;
        }
        let total = self.window.len() as f64;
        let ok = self.window.iter().filter(|(_, ok, _)| *ok).count() as f64;
        let success_rate = ok / total;
        if success_rate > 0.8 {
            ProviderStatus::Ok
        } else if success_rate >= 0.5 {
            ProviderStatus::Degraded
        } else {
            ProviderStatus::Down
        }
    }

    fn avg_latency_ms(&self) -> u64 {
        if self.window.is_empty() {
            return 0;
        }
        let sum: u64 = self.window.iter().map(|(_, _, lat)| lat).sum();
        sum / self.window.len() as u64
    }

    fn requests_ok(&self) -> u32 {
        self.window.iter().filter(|(_, ok, _)| *ok).count() as u32
    }

    fn requests_err(&self) -> u32 {
        self.window.iter().filter(|(_, ok, _)| !*ok).count() as u32
    }

    fn to_entry(&self, role: &str) -> RoleHealthEntry {
        RoleHealthEntry {
            role: role.to_string(),
            status: self.derive_status(),
            last_success_at: self.last_success_at,
            last_error_at: self.last_error_at,
            last_error: self.last_error.clone(),
            avg_latency_ms: self.avg_latency_ms(),
            requests_ok: self.requests_ok(),
            requests_err: self.requests_err(),
            total_requests: self.total_requests,
        }
    }
}

/// Concurrent, lock-free health tracker keyed by gateway role
/// (`"planner"`, `"finalizer"`, `"reflector"`, `"progress_blurb"`).
pub struct HealthTracker {
    entries: DashMap<String, InternalEntry>,
}

impl HealthTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
        })
    }

    pub fn record_success(&self, role: &str, latency_ms: u64) {
        let mut entry = self.entries.entry(role.to_string()).or_insert_with(InternalEntry::new);
        entry.prune();
        entry.window.push_back((Instant::now(), true, latency_ms));
        entry.last_success_at = Some(chrono::Utc::now().timestamp());
        entry.total_requests += 1;
        entry.override_status = None;
    }

    pub fn record_error(&self, role: &str, error: &LlmError) {
        let mut entry = self.entries.entry(role.to_string()).or_insert_with(InternalEntry::new);
        entry.prune();
        entry.window.push_back((Instant::now(), false, 0));
        entry.last_error_at = Some(chrono::Utc::now().timestamp());
        entry.last_error = Some(error.to_string());
        entry.total_requests += 1;

        match error {
            LlmError::RateLimited { .. } => {
                entry.override_status = Some(ProviderStatus::RateLimited);
            }
            LlmError::Api { status, .. } if *status == 401 || *status == 403 => {
                entry.override_status = Some(ProviderStatus::Down);
            }
            _ => {}
        }
    }

    pub fn status_for(&self, role: &str) -> ProviderStatus {
        self.entries
            .get(role)
            .map(|e| e.derive_status())
            .unwrap_or(ProviderStatus::Unknown)
    }

    pub fn all_entries(&self) -> Vec<RoleHealthEntry> {
        self.entries.iter().map(|e| e.value().to_entry(e.key())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_success_updates_status() {
        let tracker = HealthTracker::new();
        for _ in 0..5 {
            tracker.record_success("planner", 100);
        }
        assert_eq!(tracker.status_for("planner"), ProviderStatus::Ok);
    }

    #[test]
    fn record_errors_degrades_status() {
        let tracker = HealthTracker::new();
        for _ in 0..10 {
            tracker.record_error("planner", &LlmError::Unavailable("down".into()));
        }
        assert_eq!(tracker.status_for("planner"), ProviderStatus::Down);
    }

    #[test]
    fn rate_limited_overrides_status() {
        let tracker = HealthTracker::new();
        for _ in 0..5 {
            tracker.record_success("finalizer", 100);
        }
        tracker.record_error(
            "finalizer",
            &LlmError::RateLimited {
                retry_after_ms: 5000,
            },
        );
        assert_eq!(tracker.status_for("finalizer"), ProviderStatus::RateLimited);
    }

    #[test]
    fn success_clears_override() {
        let tracker = HealthTracker::new();
        tracker.record_error("reflector", &LlmError::RateLimited { retry_after_ms: 1000 });
        assert_eq!(tracker.status_for("reflector"), ProviderStatus::RateLimited);
        tracker.record_success("reflector", 50);
        assert_eq!(tracker.status_for("reflector"), ProviderStatus::Ok);
    }

    #[test]
    fn unknown_role_reports_unknown() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.status_for("nonexistent"), ProviderStatus::Unknown);
    }
}

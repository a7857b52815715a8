//! Per-session traffic statistics.
//!
//! Counters are atomics so the CLI can read them while the client is
//! being driven from its polling loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Traffic counters for one client instance.
#[derive(Debug)]
pub struct SessionStats {
    /// Identifier for this client instance
    session_id: Uuid,
    /// Command lines written to the bridge
    lines_sent: AtomicU64,
    /// Lines received from the bridge
    lines_received: AtomicU64,
    /// Lines appended to a log file
    lines_logged: AtomicU64,
    /// Failed log file appends
    sink_errors: AtomicU64,
    /// Completed connects
    connects: AtomicU64,
    /// Instance start time
    started: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            lines_sent: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            lines_logged: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            started: Utc::now(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_sent(&self) {
        self.lines_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_logged(&self) {
        self.lines_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            session_id: self.session_id,
            lines_sent: self.lines_sent.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            lines_logged: self.lines_logged.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            started: self.started,
            duration_secs: (Utc::now() - self.started).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics ({}):\n\
             - Connects: {}\n\
             - Lines sent: {}\n\
             - Lines received: {}\n\
             - Lines logged: {}\n\
             - Log write failures: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.connects,
            stats.lines_sent,
            stats.lines_received,
            stats.lines_logged,
            stats.sink_errors,
            stats.duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    pub session_id: Uuid,
    pub lines_sent: u64,
    pub lines_received: u64,
    pub lines_logged: u64,
    pub sink_errors: u64,
    pub connects: u64,
    pub started: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedSessionStats = Arc<SessionStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = SessionStats::new();
        stats.record_sent();
        stats.record_received();
        stats.record_received();
        stats.record_logged();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.lines_sent, 1);
        assert_eq!(snapshot.lines_received, 2);
        assert_eq!(snapshot.lines_logged, 1);
        assert_eq!(snapshot.sink_errors, 0);
    }

    #[test]
    fn test_summary_format() {
        let stats = SessionStats::new();
        let summary = stats.summary();

        assert!(summary.contains("Lines sent"));
        assert!(summary.contains("Lines logged"));
        assert!(summary.contains(&stats.session_id().to_string()));
    }
}

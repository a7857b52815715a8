//! Session bookkeeping for the bridge client.
//!
//! This module contains:
//! - The session state machine and the connect-acknowledgement matcher
//! - The append-only log sink for received lines
//! - Per-session statistics

pub mod sink;
pub mod state;
pub mod stats;

// Re-export commonly used types
pub use sink::{log_file_name, LogSink};
pub use state::{matches_sentinel, SessionState};
pub use stats::{SessionStats, SessionStatsSnapshot, SharedSessionStats};

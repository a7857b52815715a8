//! Session state machine.
//!
//! A session moves `Disconnected -> SocketOpen -> DeviceConnected -> Logging`
//! and falls back to `Disconnected` on teardown from any state.

use serde::{Deserialize, Serialize};

/// Connection/device state of a [`crate::DeviceBridgeClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No socket open
    #[default]
    Disconnected,
    /// Socket open, device not yet acknowledged
    SocketOpen,
    /// Bridge acknowledged the device connection
    DeviceConnected,
    /// Device connected and inbound lines are mirrored to a log file
    Logging,
}

impl SessionState {
    /// Whether a socket is open in this state.
    pub fn has_socket(self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }

    /// Whether the bridge has acknowledged the device in this state.
    pub fn has_device(self) -> bool {
        matches!(self, SessionState::DeviceConnected | SessionState::Logging)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::SocketOpen => "socket_open",
            SessionState::DeviceConnected => "device_connected",
            SessionState::Logging => "logging",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether `response` acknowledges a device connection.
///
/// The first `sentinel.chars().count()` characters of the response are taken,
/// all whitespace is removed from both that prefix and the sentinel, and the
/// two are compared ordinally. A response shorter than the sentinel never
/// matches.
pub fn matches_sentinel(sentinel: &str, response: &str) -> bool {
    let len = sentinel.chars().count();
    if response.chars().count() < len {
        return false;
    }

    let expected = sentinel.chars().filter(|c| !c.is_whitespace());
    let actual = response
        .chars()
        .take(len)
        .filter(|c| !c.is_whitespace());

    expected.eq(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "R device_connect OK";

    #[test]
    fn test_exact_sentinel_matches() {
        assert!(matches_sentinel(SENTINEL, "R device_connect OK"));
    }

    #[test]
    fn test_trailing_payload_matches() {
        assert!(matches_sentinel(SENTINEL, "R device_connect OK\r"));
        assert!(matches_sentinel(SENTINEL, "R device_connect OK 740163"));
    }

    #[test]
    fn test_internal_whitespace_is_ignored() {
        // Same length as the sentinel, whitespace moved around
        assert!(matches_sentinel(SENTINEL, "R  device_connectOK"));
        assert!(matches_sentinel(SENTINEL, "R\tdevice_connect OK"));
    }

    #[test]
    fn test_near_miss_does_not_match() {
        assert!(!matches_sentinel(SENTINEL, "R device_connect ER"));
        assert!(!matches_sentinel(SENTINEL, "R device_list     OK"));
    }

    #[test]
    fn test_short_response_does_not_match() {
        assert!(!matches_sentinel(SENTINEL, "R device_connect"));
        assert!(!matches_sentinel(SENTINEL, ""));
    }

    #[test]
    fn test_whitespace_padding_past_prefix_does_not_match() {
        // Only the first sentinel-length characters are considered
        assert!(!matches_sentinel(SENTINEL, "    R device_connect OK"));
    }

    #[test]
    fn test_state_predicates() {
        assert!(!SessionState::Disconnected.has_socket());
        assert!(SessionState::SocketOpen.has_socket());
        assert!(!SessionState::SocketOpen.has_device());
        assert!(SessionState::Logging.has_device());
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }
}

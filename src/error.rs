//! Error types for the bridge client.

use crate::session::SessionState;

/// Failure to open a connection to the bridge server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Host name could not be resolved to any address
    Resolve { target: String, message: String },
    /// Server actively refused the connection
    Refused { target: String, message: String },
    /// Connect did not complete within the configured timeout
    TimedOut { target: String },
    /// Any other failure (no route, network down, ...)
    Unreachable { target: String, message: String },
}

impl ConnectError {
    /// The `host:port` the connect attempt was aimed at.
    pub fn target(&self) -> &str {
        match self {
            ConnectError::Resolve { target, .. }
            | ConnectError::Refused { target, .. }
            | ConnectError::TimedOut { target }
            | ConnectError::Unreachable { target, .. } => target,
        }
    }
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Resolve { target, message } => {
                write!(f, "Could not resolve {target}: {message}")
            }
            ConnectError::Refused { target, message } => {
                write!(f, "Connection to {target} refused: {message}")
            }
            ConnectError::TimedOut { target } => write!(f, "Connection to {target} timed out"),
            ConnectError::Unreachable { target, message } => {
                write!(f, "Could not reach {target}: {message}")
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// An operation was invoked outside the states it is valid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateError {
    pub operation: &'static str,
    pub state: SessionState,
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not valid while {}", self.operation, self.state)
    }
}

impl std::error::Error for StateError {}

/// Read/write failure on the line transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// No socket is open
    NotConnected(StateError),
    /// Write failed (broken pipe, reset, ...)
    Write(String),
    /// Transport was already closed locally
    Closed,
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::NotConnected(e) => write!(f, "Not connected: {e}"),
            IoError::Write(e) => write!(f, "Write failed: {e}"),
            IoError::Closed => write!(f, "Transport is closed"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::NotConnected(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to create or append to a session log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    Io(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "Log file error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_target() {
        let err = ConnectError::TimedOut {
            target: "127.0.0.1:20".to_string(),
        };
        assert_eq!(err.target(), "127.0.0.1:20");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_not_connected_message_names_operation() {
        let err = IoError::NotConnected(StateError {
            operation: "send_line",
            state: SessionState::Disconnected,
        });
        let msg = err.to_string();
        assert!(msg.contains("send_line"));
        assert!(msg.contains("disconnected"));
    }
}

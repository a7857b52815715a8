//! Line transports to the bridge server.
//!
//! A transport carries newline-delimited text in both directions. Receiving
//! is always non-blocking: implementations buffer inbound lines (for TCP, on
//! a background reader thread) and hand them out one at a time.

pub mod mock;
pub mod tcp;

use crate::error::{ConnectError, IoError};
use std::time::Duration;

pub use mock::{MockBridge, MockConnector, MockTransport};
pub use tcp::{TcpConnector, TcpTransport};

/// Something that happened on the receive side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound line, without its terminator
    Line(String),
    /// The peer closed the connection
    Closed,
    /// The receive side failed
    Failed(String),
}

/// An open, bidirectional line connection.
pub trait LineTransport: Send {
    /// Write `line` followed by a line terminator.
    fn send_line(&mut self, line: &str) -> Result<(), IoError>;

    /// Take the next buffered receive event, if any. Never blocks.
    fn try_recv(&mut self) -> Option<TransportEvent>;

    /// Close the connection. Closing twice is a no-op.
    fn close(&mut self);
}

/// Opens transports to a `host:port` target.
pub trait Connector {
    fn open(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn LineTransport>, ConnectError>;
}

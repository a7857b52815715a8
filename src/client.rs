//! Device bridge client.
//!
//! [`DeviceBridgeClient`] owns at most one connection to a bridge server and
//! is driven entirely by its caller: `connect`, `send_line`, `set_logging`
//! and `disconnect` on demand, and `poll_received` once per tick of whatever
//! loop hosts it. Nothing here runs on its own except the transport's reader.

use crate::config::Config;
use crate::error::{ConnectError, IoError, SinkError, StateError};
use crate::session::{
    log_file_name, matches_sentinel, LogSink, SessionState, SessionStats, SharedSessionStats,
};
use crate::transport::{Connector, LineTransport, TcpConnector, TransportEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One line received from the bridge, terminator removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundLine {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for InboundLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// The single open connection of a client.
struct Connection {
    target: String,
    transport: Box<dyn LineTransport>,
    /// Log file for this session, created on first `set_logging(true)`
    log_path: PathBuf,
    log_created: bool,
    peer_closed: bool,
}

/// Line-protocol client for a biosensor bridge server.
pub struct DeviceBridgeClient<C: Connector = TcpConnector> {
    config: Config,
    connector: C,
    state: SessionState,
    connection: Option<Connection>,
    sink: Option<LogSink>,
    stats: SharedSessionStats,
}

impl DeviceBridgeClient<TcpConnector> {
    /// Create a client that connects over TCP.
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> DeviceBridgeClient<C> {
    /// Create a client that opens connections through `connector`.
    pub fn with_connector(config: Config, connector: C) -> Self {
        Self {
            config,
            connector,
            state: SessionState::Disconnected,
            connection: None,
            sink: None,
            stats: Arc::new(SessionStats::new()),
        }
    }

    /// Open a connection to the bridge at `host:port`.
    ///
    /// Does nothing if a connection is already open.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectError> {
        if let Some(conn) = self.connection.as_ref() {
            tracing::debug!("connect ignored, already connected to {}", conn.target);
            return Ok(());
        }

        let transport = self
            .connector
            .open(host, port, self.config.connect_timeout())?;
        let log_path = self
            .config
            .log_dir
            .join(log_file_name(&self.config.log_file_prefix, Utc::now()));
        let target = format!("{host}:{port}");

        tracing::info!("connected to bridge at {target}");
        self.connection = Some(Connection {
            target,
            transport,
            log_path,
            log_created: false,
            peer_closed: false,
        });
        self.state = SessionState::SocketOpen;
        self.stats.record_connect();
        Ok(())
    }

    /// Connect to the host and port from the configuration.
    pub fn connect_configured(&mut self) -> Result<(), ConnectError> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.connect(&host, port)
    }

    /// Write one command line to the bridge.
    ///
    /// A failed write leaves the connection open; call [`Self::disconnect`]
    /// to tear it down.
    pub fn send_line(&mut self, text: &str) -> Result<(), IoError> {
        let state = self.state;
        let conn = self.connection.as_mut().ok_or(IoError::NotConnected(StateError {
            operation: "send_line",
            state,
        }))?;

        conn.transport.send_line(text)?;
        self.stats.record_sent();
        Ok(())
    }

    /// Take the next received line, if one is buffered. Never blocks.
    ///
    /// While logging, the line is also appended to the session log file.
    /// While the socket is open but no device is acknowledged, the line is
    /// checked against the connect sentinel.
    pub fn poll_received(&mut self) -> Option<InboundLine> {
        let text = self.next_line()?;
        self.stats.record_received();

        match self.state {
            SessionState::SocketOpen => {
                if matches_sentinel(&self.config.connect_ok_sentinel, &text) {
                    self.state = SessionState::DeviceConnected;
                    tracing::info!("device connection acknowledged by bridge");
                }
            }
            SessionState::Logging => self.append_to_sink(&text),
            SessionState::DeviceConnected | SessionState::Disconnected => {}
        }

        Some(InboundLine::new(text))
    }

    fn next_line(&mut self) -> Option<String> {
        let conn = self.connection.as_mut()?;
        loop {
            match conn.transport.try_recv()? {
                TransportEvent::Line(text) => return Some(text),
                TransportEvent::Closed => {
                    if !conn.peer_closed {
                        tracing::warn!("bridge at {} closed the connection", conn.target);
                        conn.peer_closed = true;
                    }
                }
                TransportEvent::Failed(e) => {
                    tracing::warn!("read from bridge at {} failed: {e}", conn.target);
                    conn.peer_closed = true;
                }
            }
        }
    }

    fn append_to_sink(&mut self, text: &str) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        match sink.append(text) {
            Ok(()) => self.stats.record_logged(),
            Err(e) => {
                tracing::warn!("could not append to {}: {e}", sink.path().display());
                self.stats.record_sink_error();
            }
        }
    }

    /// Turn mirroring of received lines to the session log file on or off.
    ///
    /// Only meaningful once the device is connected; in other states this is
    /// a no-op.
    pub fn set_logging(&mut self, enabled: bool) -> Result<(), SinkError> {
        match (enabled, self.state) {
            (true, SessionState::DeviceConnected) => {
                let Some(conn) = self.connection.as_mut() else {
                    return Ok(());
                };
                // First enable creates a fresh file; later ones append to it
                let sink = if conn.log_created {
                    LogSink::open(conn.log_path.clone())?
                } else {
                    let sink = LogSink::create_new(conn.log_path.clone())?;
                    conn.log_path = sink.path().to_path_buf();
                    conn.log_created = true;
                    sink
                };
                tracing::info!("logging received lines to {}", sink.path().display());
                self.sink = Some(sink);
                self.state = SessionState::Logging;
            }
            (false, SessionState::Logging) => {
                self.close_sink();
                self.state = SessionState::DeviceConnected;
            }
            (true, SessionState::Logging) | (false, SessionState::DeviceConnected) => {}
            (_, state) => {
                let err = StateError {
                    operation: "set_logging",
                    state,
                };
                tracing::debug!("ignored: {err}");
            }
        }
        Ok(())
    }

    fn close_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            tracing::info!(
                "stopped logging, {} lines written to {}",
                sink.lines_written(),
                sink.path().display()
            );
        }
    }

    /// Tear down the connection and return to `Disconnected`.
    ///
    /// If a device is connected, the disconnect command is sent first on a
    /// best-effort basis; a failure there is logged and otherwise ignored.
    pub fn disconnect(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };

        if self.state.has_device() {
            match conn.transport.send_line(&self.config.disconnect_command) {
                Ok(()) => self.stats.record_sent(),
                Err(e) => tracing::warn!("device disconnect command not delivered: {e}"),
            }
        }

        self.close_sink();
        conn.transport.close();
        self.state = SessionState::Disconnected;
        tracing::info!("disconnected from bridge at {}", conn.target);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the bridge has hung up or the receive side failed.
    ///
    /// The connection stays open from the client's point of view until
    /// [`Self::disconnect`] is called.
    pub fn peer_closed(&self) -> bool {
        self.connection.as_ref().map(|c| c.peer_closed).unwrap_or(false)
    }

    /// Path of the log file currently being written, if logging.
    pub fn log_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.path())
    }

    /// The `host:port` of the open connection.
    pub fn target(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.target.as_str())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> SharedSessionStats {
        self.stats.clone()
    }
}

impl<C: Connector> Drop for DeviceBridgeClient<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

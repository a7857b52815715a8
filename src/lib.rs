//! Biosensor Bridge Client - headless line-protocol client for wearable
//! biosensor bridge servers.
//!
//! A bridge server owns the Bluetooth link to the wearable and exposes it as
//! a plain-text, newline-delimited command/response protocol over TCP. This
//! crate provides the client half of that conversation: it opens the socket,
//! forwards command lines verbatim, hands back received lines without ever
//! blocking the caller, tracks whether the bridge has acknowledged a device,
//! and optionally mirrors the incoming stream to a per-session log file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     DeviceBridgeClient                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │   send_line ──────────────▶ ┌─────────────┐ ──▶ bridge server  │
//! │                            │  Transport  │                   │
//! │   poll_received ◀── queue ◀│ (reader thr)│ ◀── bridge server  │
//! │        │                   └─────────────┘                   │
//! │        ▼                                                     │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │SessionState │   │   LogSink   │   │ SessionStats│         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use biosensor_bridge_client::{Config, DeviceBridgeClient, SessionState};
//!
//! let mut client = DeviceBridgeClient::new(Config::default());
//! client.connect("127.0.0.1", 28000).expect("bridge not reachable");
//! client.send_line("device_connect 740163").expect("write failed");
//!
//! loop {
//!     while let Some(line) = client.poll_received() {
//!         println!("{line}");
//!     }
//!     if client.state() == SessionState::DeviceConnected {
//!         client.set_logging(true).expect("log file");
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;

// Re-export key types at crate root for convenience
pub use client::{DeviceBridgeClient, InboundLine};
pub use config::{Config, ConfigError};
pub use error::{ConnectError, IoError, SinkError, StateError};
pub use session::{LogSink, SessionState, SessionStats, SharedSessionStats};
pub use transport::{Connector, LineTransport, TcpConnector, TransportEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

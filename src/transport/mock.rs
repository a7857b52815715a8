//! In-memory bridge used in tests and offline demos.
//!
//! [`MockBridge`] plays the server side: it injects inbound lines and records
//! what the client wrote. [`MockConnector`] hands out transports wired to it.

use super::{Connector, LineTransport, TransportEvent};
use crate::error::{ConnectError, IoError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockShared {
    refuse_connections: bool,
    fail_writes: bool,
    opened: u64,
    live: usize,
    written: Vec<String>,
    inbound: Option<Sender<TransportEvent>>,
}

/// Server side of the in-memory bridge.
#[derive(Debug, Clone, Default)]
pub struct MockBridge {
    shared: Arc<Mutex<MockShared>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose transports talk to this bridge.
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            shared: self.shared.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockShared> {
        lock_shared(&self.shared)
    }

    /// Queue a line for the most recently opened transport.
    ///
    /// Returns false when no transport has been opened yet or it was dropped.
    pub fn push_line(&self, line: impl Into<String>) -> bool {
        self.push_event(TransportEvent::Line(line.into()))
    }

    /// Simulate the server hanging up.
    pub fn hang_up(&self) -> bool {
        self.push_event(TransportEvent::Closed)
    }

    fn push_event(&self, event: TransportEvent) -> bool {
        match self.lock().inbound.as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Every line written by clients, in order.
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// Number of transports opened so far.
    pub fn opened(&self) -> u64 {
        self.lock().opened
    }

    /// Number of transports currently open.
    pub fn live_connections(&self) -> usize {
        self.lock().live
    }

    pub fn set_refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

fn lock_shared(shared: &Mutex<MockShared>) -> MutexGuard<'_, MockShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Opens [`MockTransport`]s attached to a [`MockBridge`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    shared: Arc<Mutex<MockShared>>,
}

impl Connector for MockConnector {
    fn open(
        &self,
        host: &str,
        port: u16,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn LineTransport>, ConnectError> {
        let mut shared = lock_shared(&self.shared);
        if shared.refuse_connections {
            return Err(ConnectError::Refused {
                target: format!("{host}:{port}"),
                message: "mock bridge refused connection".to_string(),
            });
        }

        let (sender, events) = unbounded();
        shared.inbound = Some(sender);
        shared.opened += 1;
        shared.live += 1;

        Ok(Box::new(MockTransport {
            shared: self.shared.clone(),
            events,
            closed: false,
        }))
    }
}

/// Client side of the in-memory bridge.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<MockShared>>,
    events: Receiver<TransportEvent>,
    closed: bool,
}

impl LineTransport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<(), IoError> {
        if self.closed {
            return Err(IoError::Closed);
        }
        let mut shared = lock_shared(&self.shared);
        if shared.fail_writes {
            return Err(IoError::Write("broken pipe".to_string()));
        }
        shared.written.push(line.to_string());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        if self.closed {
            return None;
        }
        self.events.try_recv().ok()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut shared = lock_shared(&self.shared);
        shared.live = shared.live.saturating_sub(1);
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_flow_both_ways() {
        let bridge = MockBridge::new();
        assert!(!bridge.push_line("too early"));

        let mut transport = bridge.connector().open("localhost", 20, None).unwrap();
        assert!(bridge.push_line("R device_list 1 | 740163 Empatica_E4"));
        transport.send_line("device_list").unwrap();

        assert_eq!(
            transport.try_recv(),
            Some(TransportEvent::Line("R device_list 1 | 740163 Empatica_E4".into()))
        );
        assert_eq!(transport.try_recv(), None);
        assert_eq!(bridge.written(), vec!["device_list".to_string()]);
    }

    #[test]
    fn test_close_tracks_live_connections() {
        let bridge = MockBridge::new();
        let mut transport = bridge.connector().open("localhost", 20, None).unwrap();
        assert_eq!(bridge.live_connections(), 1);

        transport.close();
        transport.close();
        assert_eq!(bridge.live_connections(), 0);
        assert_eq!(bridge.opened(), 1);
        assert_eq!(transport.send_line("x"), Err(IoError::Closed));
    }

    #[test]
    fn test_refuse_and_fail_writes() {
        let bridge = MockBridge::new();
        bridge.set_refuse_connections(true);
        assert!(bridge.connector().open("localhost", 20, None).is_err());

        bridge.set_refuse_connections(false);
        bridge.set_fail_writes(true);
        let mut transport = bridge.connector().open("localhost", 20, None).unwrap();
        assert!(matches!(transport.send_line("x"), Err(IoError::Write(_))));
        assert!(bridge.written().is_empty());
    }
}

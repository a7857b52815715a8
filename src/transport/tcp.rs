//! TCP line transport.
//!
//! Writes go straight to the socket from the caller's thread, bounded by the
//! connect timeout. Reads happen on a dedicated reader thread that splits the
//! stream on `\n` and forwards each line through a crossbeam channel, so
//! polling never blocks.

use super::{Connector, LineTransport, TransportEvent};
use crate::error::{ConnectError, IoError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Opens [`TcpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn open(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn LineTransport>, ConnectError> {
        let target = format!("{host}:{port}");
        let stream = connect_stream(host, port, timeout, &target)?;
        let transport = TcpTransport::start(stream, &target, timeout)?;
        Ok(Box::new(transport))
    }
}

fn connect_stream(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
    target: &str,
) -> Result<TcpStream, ConnectError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| ConnectError::Resolve {
            target: target.to_string(),
            message: e.to_string(),
        })?
        .collect();

    if addrs.is_empty() {
        return Err(ConnectError::Resolve {
            target: target.to_string(),
            message: "no addresses found".to_string(),
        });
    }

    let mut last_err = None;
    for addr in &addrs {
        let attempt = match timeout {
            Some(t) if !t.is_zero() => TcpStream::connect_timeout(addr, t),
            _ => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!("connect to {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }

    // addrs is non-empty, so at least one attempt recorded an error
    let err = last_err.unwrap_or_else(|| std::io::Error::from(ErrorKind::NotConnected));
    Err(classify_connect_error(target, err))
}

fn classify_connect_error(target: &str, err: std::io::Error) -> ConnectError {
    let target = target.to_string();
    match err.kind() {
        ErrorKind::ConnectionRefused => ConnectError::Refused {
            target,
            message: err.to_string(),
        },
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ConnectError::TimedOut { target },
        _ => ConnectError::Unreachable {
            target,
            message: err.to_string(),
        },
    }
}

/// A connected TCP socket plus its reader thread.
pub struct TcpTransport {
    stream: TcpStream,
    events: Receiver<TransportEvent>,
    reader: Option<JoinHandle<()>>,
    closing: Arc<AtomicBool>,
    closed: bool,
}

impl TcpTransport {
    /// Take ownership of a connected stream and start its reader thread.
    ///
    /// `write_timeout` bounds every write; `None` or zero lets writes block.
    pub fn start(
        stream: TcpStream,
        target: &str,
        write_timeout: Option<Duration>,
    ) -> Result<Self, ConnectError> {
        let write_timeout = write_timeout.filter(|t| !t.is_zero());
        stream
            .set_write_timeout(write_timeout)
            .map_err(|e| ConnectError::Unreachable {
                target: target.to_string(),
                message: format!("could not set write timeout: {e}"),
            })?;

        let read_half = stream.try_clone().map_err(|e| ConnectError::Unreachable {
            target: target.to_string(),
            message: format!("could not clone socket: {e}"),
        })?;

        let (sender, events) = unbounded();
        let closing = Arc::new(AtomicBool::new(false));
        let reader_closing = closing.clone();
        let reader = thread::Builder::new()
            .name(format!("bridge-reader-{target}"))
            .spawn(move || read_lines(read_half, sender, reader_closing))
            .map_err(|e| ConnectError::Unreachable {
                target: target.to_string(),
                message: format!("could not start reader thread: {e}"),
            })?;

        tracing::debug!("reader thread started for {target}");

        Ok(Self {
            stream,
            events,
            reader: Some(reader),
            closing,
            closed: false,
        })
    }
}

/// Reader thread body: forward every line until EOF, error, or local close.
fn read_lines(stream: TcpStream, sender: Sender<TransportEvent>, closing: Arc<AtomicBool>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => TransportEvent::Closed,
            Ok(_) => TransportEvent::Line(strip_terminator(&buf)),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => TransportEvent::Failed(e.to_string()),
        };

        if closing.load(Ordering::SeqCst) {
            break;
        }

        let last = !matches!(event, TransportEvent::Line(_));
        if sender.send(event).is_err() || last {
            break;
        }
    }
}

fn strip_terminator(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl LineTransport for TcpTransport {
    fn send_line(&mut self, line: &str) -> Result<(), IoError> {
        if self.closed {
            return Err(IoError::Closed);
        }
        let mut payload = String::with_capacity(line.len() + 1);
        payload.push_str(line);
        payload.push('\n');

        self.stream
            .write_all(payload.as_bytes())
            .and_then(|_| self.stream.flush())
            .map_err(|e| IoError::Write(e.to_string()))
    }

    fn try_recv(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.closing.store(true, Ordering::SeqCst);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!("socket shutdown: {e}");
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::warn!("reader thread panicked");
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Instant;

    fn next_event(transport: &mut TcpTransport) -> Option<TransportEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(event) = transport.try_recv() {
                return Some(event);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator(b"abc\n"), "abc");
        assert_eq!(strip_terminator(b"abc\r\n"), "abc");
        assert_eq!(strip_terminator(b"abc"), "abc");
        assert_eq!(strip_terminator(b"\n"), "");
    }

    #[test]
    fn test_lines_split_across_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"R device_").unwrap();
            socket.flush().unwrap();
            thread::sleep(Duration::from_millis(20));
            socket.write_all(b"connect OK\r\nE4_Acc 1 2 3\n").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut transport = TcpTransport::start(stream, &addr.to_string(), None).unwrap();

        assert_eq!(
            next_event(&mut transport),
            Some(TransportEvent::Line("R device_connect OK".into()))
        );
        assert_eq!(
            next_event(&mut transport),
            Some(TransportEvent::Line("E4_Acc 1 2 3".into()))
        );
        server.join().unwrap();
        assert_eq!(next_event(&mut transport), Some(TransportEvent::Closed));
    }

    #[test]
    fn test_send_line_appends_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).unwrap();
            received
        });

        let mut transport = TcpConnector
            .open("127.0.0.1", addr.port(), Some(Duration::from_secs(2)))
            .unwrap();
        transport.send_line("device_list").unwrap();
        transport.close();
        transport.close();

        assert_eq!(server.join().unwrap(), "device_list\n");
        assert_eq!(transport.send_line("late"), Err(IoError::Closed));
    }

    #[test]
    fn test_stalled_peer_fails_write_instead_of_blocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let server = thread::spawn(move || {
            // Accept but never read, so the send buffers fill up
            let (socket, _) = listener.accept().unwrap();
            let _ = release_rx.recv();
            drop(socket);
        });

        let mut transport = TcpConnector
            .open("127.0.0.1", addr.port(), Some(Duration::from_millis(200)))
            .unwrap();
        let big = "x".repeat(64 * 1024 * 1024);
        let started = Instant::now();
        let result = transport.send_line(&big);

        assert!(matches!(result, Err(IoError::Write(_))), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(10));

        transport.close();
        let _ = release_tx.send(());
        server.join().unwrap();
    }

    #[test]
    fn test_refused_connection_is_classified() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = TcpConnector
            .open("127.0.0.1", port, Some(Duration::from_secs(2)))
            .err()
            .unwrap();
        assert!(matches!(err, ConnectError::Refused { .. }), "{err:?}");
        assert_eq!(err.target(), format!("127.0.0.1:{port}"));
    }
}

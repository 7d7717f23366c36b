//! Scripted mock transport for exercising the discovery worker.
//!
//! Allows tests to drive the handshake state machine through any sequence of
//! timeouts, datagrams, and socket faults without opening real sockets. The
//! session keeps its observation state behind shared handles so a test can
//! inspect what was sent (and whether the session was closed) after the
//! session has been moved into the worker.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::transport::{DiscoverySession, DiscoveryTransport, TransportError};

/// One scripted step for [`MockSession::receive`].
#[derive(Debug, Clone)]
pub enum ReceiveStep {
    /// The receive window elapses without traffic.
    Timeout,
    /// A datagram arrives from the given sender.
    Datagram(Vec<u8>, SocketAddr),
    /// The socket fails hard.
    Error,
}

/// A record of one `send_to` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub payload: Vec<u8>,
    pub destination: String,
}

/// Shared observation handle for one scripted session.
#[derive(Debug, Default)]
pub struct SessionLog {
    sent: Mutex<Vec<SentDatagram>>,
    closed: Mutex<bool>,
}

impl SessionLog {
    /// Everything sent through the session so far, in order.
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// Whether [`DiscoverySession::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().expect("lock poisoned")
    }
}

/// A scripted [`DiscoverySession`]: plays back [`ReceiveStep`]s in order and
/// records everything sent through it.
///
/// An exhausted script behaves like a hard socket error, so a worker driven
/// past the end of the script tears the session down instead of spinning.
#[derive(Debug)]
pub struct MockSession {
    steps: VecDeque<ReceiveStep>,
    log: Arc<SessionLog>,
    fail_sends: bool,
    idle_when_exhausted: bool,
}

impl MockSession {
    /// A session that plays `steps` and then fails.
    pub fn new(steps: Vec<ReceiveStep>) -> Self {
        Self {
            steps: steps.into(),
            log: Arc::new(SessionLog::default()),
            fail_sends: false,
            idle_when_exhausted: false,
        }
    }

    /// A session on which every `send_to` fails.
    pub fn failing_sends(steps: Vec<ReceiveStep>) -> Self {
        Self {
            fail_sends: true,
            ..Self::new(steps)
        }
    }

    /// A session that reports an empty receive window forever, sleeping for
    /// the requested timeout like a real socket would.
    pub fn idle() -> Self {
        Self {
            idle_when_exhausted: true,
            ..Self::new(Vec::new())
        }
    }

    /// Handle for observing this session after it moves into the worker.
    pub fn log(&self) -> Arc<SessionLog> {
        Arc::clone(&self.log)
    }
}

impl DiscoverySession for MockSession {
    fn receive(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError> {
        match self.steps.pop_front() {
            Some(ReceiveStep::Timeout) => Ok(None),
            Some(ReceiveStep::Datagram(bytes, sender)) => Ok(Some((bytes, sender))),
            Some(ReceiveStep::Error) => Err(TransportError::Receive(scripted_error(
                "scripted receive failure",
            ))),
            None if self.idle_when_exhausted => {
                std::thread::sleep(timeout);
                Ok(None)
            }
            None => Err(TransportError::Receive(scripted_error("script exhausted"))),
        }
    }

    fn send_to(&mut self, payload: &[u8], destination: &str) -> Result<usize, TransportError> {
        if self.fail_sends {
            return Err(TransportError::Send(scripted_error(
                "scripted send failure",
            )));
        }
        self.log
            .sent
            .lock()
            .expect("lock poisoned")
            .push(SentDatagram {
                payload: payload.to_vec(),
                destination: destination.to_string(),
            });
        Ok(payload.len())
    }

    fn close(&mut self) {
        *self.log.closed.lock().expect("lock poisoned") = true;
    }
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sessions: Mutex<VecDeque<MockSession>>,
    opens: AtomicUsize,
}

/// A scripted [`DiscoveryTransport`]: hands out pre-built sessions in order
/// and counts every `open` call.
///
/// Once the queue is empty, `open` fails, which the worker treats as a
/// transient condition and retries. Clones share the same queue and counter,
/// so a test can keep one handle while the worker owns the other.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

impl MockTransport {
    pub fn new(sessions: Vec<MockSession>) -> Self {
        Self {
            inner: Arc::new(MockTransportInner {
                sessions: Mutex::new(sessions.into()),
                opens: AtomicUsize::new(0),
            }),
        }
    }

    /// How many times `open` has been called.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }
}

impl DiscoveryTransport for MockTransport {
    type Session = MockSession;

    fn open(&self) -> Result<MockSession, TransportError> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        self.inner
            .sessions
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| TransportError::Bind {
                port: 0,
                source: scripted_error("no scripted session left"),
            })
    }
}

fn scripted_error(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, message.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

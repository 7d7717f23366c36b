//! The discovery worker: a handshake state machine over the multicast
//! transport.
//!
//! One worker runs for the lifetime of the process, on a dedicated thread so
//! its blocking socket I/O never ties up the async runtime. Each pass of the
//! outer loop is one session:
//!
//! ```text
//! AwaitingReady ──gate ready──► Opening ──ok──► Probing ──peer ack──► Steady
//!       ▲                          │ err            │                   │
//!       │                          ▼ (5 ms)         │ fault/link down   │
//!       └────────── Closing ◄──────┴────────────────┴───────────────────┘
//! ```
//!
//! `Probing` and `Steady` are the two halves of the active receive loop:
//! until the handshake completes the node announces itself once per quiet
//! receive window; afterwards it only answers traffic. Any hard socket error
//! closes the session and the worker starts over with a fresh socket, so a
//! transient network fault can never kill it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camnode_core::{decode_message, encode_message, DiscoveryMessage};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::discovery::transport::{DiscoverySession, DiscoveryTransport, TransportError};
use crate::gate::{GateEvent, NetworkGate};

/// Delay before retrying a failed session open.
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Runtime parameters of the discovery worker.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Identifier this node advertises, `0..=4095`. Validated at
    /// configuration load, before anything can be encoded or sent.
    pub device_id: u16,
    /// Destination for periodic probes: the multicast group address.
    pub group: String,
    /// Receive window per loop iteration.
    pub receive_timeout: Duration,
    /// Whether the node probes for a controller and tracks handshake
    /// completion. Replies to controller probes are sent either way.
    pub handshake: bool,
}

impl From<&AppConfig> for DiscoverySettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            device_id: cfg.node.device_id,
            group: cfg.discovery.group.clone(),
            receive_timeout: cfg.discovery.receive_timeout(),
            handshake: cfg.discovery.handshake,
        }
    }
}

/// Per-session handshake progress. Reset whenever a new session opens.
#[derive(Debug, Default)]
pub struct HandshakeState {
    /// Set once a controller acknowledge has been answered successfully.
    pub handshake_done: bool,
}

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A socket-level send or receive fault; the worker opens a fresh
    /// session.
    Fault,
    /// The readiness signal was revoked; the worker parks on the gate until
    /// it returns.
    LinkDown,
    /// Process shutdown was requested.
    Shutdown,
}

/// The discovery control loop. Owns its transport and the per-session state;
/// shares nothing with the rest of the daemon except the gate.
pub struct DiscoveryWorker<T: DiscoveryTransport> {
    transport: T,
    gate: Arc<NetworkGate>,
    settings: DiscoverySettings,
}

impl<T: DiscoveryTransport> DiscoveryWorker<T> {
    pub fn new(transport: T, gate: Arc<NetworkGate>, settings: DiscoverySettings) -> Self {
        Self {
            transport,
            gate,
            settings,
        }
    }

    /// Runs the worker until shutdown is requested.
    ///
    /// Socket faults never propagate out of this loop: every fault tears the
    /// session down, and the next pass re-checks readiness and opens a fresh
    /// socket.
    pub fn run(&self) {
        loop {
            info!("waiting for network readiness");
            if self.gate.wait_ready() == GateEvent::Shutdown {
                break;
            }
            debug!("network ready; opening discovery session");

            let mut session = match self.transport.open() {
                Ok(session) => session,
                Err(e) => {
                    // Transient while the network stack settles; try again
                    // shortly.
                    warn!("failed to open discovery session: {e}");
                    thread::sleep(OPEN_RETRY_DELAY);
                    continue;
                }
            };

            let mut state = HandshakeState::default();
            let end = self.run_active(&mut session, &mut state);
            session.close();
            info!("discovery session closed ({end:?})");

            if end == SessionEnd::Shutdown {
                break;
            }
        }
        info!("discovery worker stopped");
    }

    /// Drives one session until a fault, link loss, or shutdown.
    ///
    /// Public so tests can run a single session deterministically against a
    /// scripted transport.
    pub fn run_active(&self, session: &mut T::Session, state: &mut HandshakeState) -> SessionEnd {
        loop {
            // The gate is only re-checked between receives, so revoking it
            // takes effect within one receive window.
            if self.gate.is_shutdown() {
                return SessionEnd::Shutdown;
            }
            if !self.gate.is_ready() {
                return SessionEnd::LinkDown;
            }

            match session.receive(self.settings.receive_timeout) {
                Ok(None) => {
                    // Quiet window. Keep announcing until a controller
                    // completes the handshake; stay silent afterwards.
                    if self.settings.handshake && !state.handshake_done {
                        let probe = DiscoveryMessage::probe(self.settings.device_id);
                        if let Err(e) = self.send(session, probe, &self.settings.group) {
                            warn!("probe send failed: {e}");
                            return SessionEnd::Fault;
                        }
                    }
                }
                Ok(Some((bytes, sender))) => {
                    debug!("rcv {bytes:02x?} from {sender}");
                    let msg = match decode_message(&bytes) {
                        Ok(msg) => msg,
                        Err(e) => {
                            debug!("dropping malformed datagram from {sender}: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = self.dispatch(session, state, msg, sender) {
                        warn!("reply send failed: {e}");
                        return SessionEnd::Fault;
                    }
                }
                Err(e) => {
                    error!("receive failed: {e}");
                    return SessionEnd::Fault;
                }
            }
        }
    }

    /// Applies one decoded message, replying as the protocol requires.
    fn dispatch(
        &self,
        session: &mut T::Session,
        state: &mut HandshakeState,
        msg: DiscoveryMessage,
        sender: SocketAddr,
    ) -> Result<(), TransportError> {
        // The origin bit is a claim, not a verified role: clear means the
        // message is our own traffic looped back or another device's, and
        // neither needs an answer.
        if !msg.source_is_server {
            return Ok(());
        }

        let reply_to = sender.ip().to_string();
        if !msg.alive {
            // Controller probe ("are you there?") — answer "here I am".
            self.send(
                session,
                DiscoveryMessage::acknowledge(self.settings.device_id),
                &reply_to,
            )?;
        } else if self.settings.handshake {
            // Controller acknowledge — answering it completes the handshake
            // for this session. A duplicate acknowledge is answered again
            // but the state does not change back.
            self.send(
                session,
                DiscoveryMessage::acknowledge(self.settings.device_id),
                &reply_to,
            )?;
            if !state.handshake_done {
                state.handshake_done = true;
                info!("handshake complete with {reply_to}");
            }
        }
        Ok(())
    }

    fn send(
        &self,
        session: &mut T::Session,
        msg: DiscoveryMessage,
        destination: &str,
    ) -> Result<usize, TransportError> {
        let bytes = encode_message(&msg);
        session.send_to(&bytes, destination)
    }
}

/// Spawns the worker on a dedicated named thread.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn<T>(
    transport: T,
    gate: Arc<NetworkGate>,
    settings: DiscoverySettings,
) -> std::io::Result<JoinHandle<()>>
where
    T: DiscoveryTransport + Send + 'static,
{
    thread::Builder::new()
        .name("camnode-discovery".to_string())
        .spawn(move || DiscoveryWorker::new(transport, gate, settings).run())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! UDP multicast transport for the discovery exchange.
//!
//! One [`MulticastSession`] owns one datagram socket: bound to the wildcard
//! address on the discovery port, joined to the configured group, multicast
//! TTL set to 0 so discovery traffic never leaves the local segment. The
//! session lives from [`DiscoveryTransport::open`] until [`close`] — the
//! worker creates a fresh one after every fault rather than trying to repair
//! a socket in an unknown state.
//!
//! The transport performs no retries of its own; retry policy belongs to the
//! worker.
//!
//! # How IP multicast works (for beginners)
//!
//! A multicast group is an IPv4 address in the `224.0.0.0/4` range that any
//! host can subscribe to.  Unlike broadcast, only hosts that have joined the
//! group receive its traffic:
//!
//! 1. The node binds a UDP socket on the discovery port and joins the group
//!    with an `IP_ADD_MEMBERSHIP` request.  Membership is what makes the OS
//!    deliver group datagrams to this socket.
//!
//! 2. A datagram sent to the group address reaches every current member on
//!    the segment, including the sender itself (multicast loopback is on by
//!    default).  The worker relies on the origin flag in the message, not on
//!    the socket, to tell its own traffic apart.
//!
//! 3. The TTL (time to live) controls how many router hops a datagram may
//!    cross.  A TTL of 0 means it is never forwarded at all: discovery
//!    stays on the local segment.
//!
//! # Read timeout
//!
//! Each [`receive`] call arms a read timeout on the socket, so `recv_from`
//! blocks for at most the requested window before returning a timeout error.
//! The quiet window is information in its own right: it is what tells the
//! worker to announce itself again.
//!
//! [`close`]: DiscoverySession::close
//! [`receive`]: DiscoverySession::receive

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Receive buffer size. Larger than the 2-byte protocol message so that an
/// oversized datagram surfaces as a decode failure instead of being silently
/// truncated to a valid-looking frame.
const RECV_BUFFER_LEN: usize = 64;

/// Error type for multicast transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured group address does not parse as an IPv4 address.
    #[error("invalid multicast group address '{0}'")]
    InvalidGroupAddress(String),

    /// The discovery socket could not be created or bound.
    #[error("failed to bind discovery socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// A socket option could not be applied.
    #[error("failed to configure discovery socket: {0}")]
    Configure(#[source] io::Error),

    /// Joining the multicast group failed.
    #[error("failed to join multicast group {group}: {source}")]
    Membership {
        group: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    /// A hard error occurred while waiting for a datagram.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    /// A datagram could not be sent.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// The destination host could not be resolved to an IPv4 address.
    #[error("failed to resolve destination '{0}'")]
    Resolve(String),
}

/// One open session on the discovery socket, from creation to teardown.
pub trait DiscoverySession: Send {
    /// Blocks up to `timeout` for one datagram.
    ///
    /// `Ok(None)` means the window elapsed without traffic; that is not an
    /// error. `Err(TransportError::Receive)` is a hard socket fault.
    fn receive(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError>;

    /// Sends `payload` to `destination` (hostname or address literal). The
    /// destination port is always the configured discovery port. Returns the
    /// number of bytes sent.
    fn send_to(&mut self, payload: &[u8], destination: &str) -> Result<usize, TransportError>;

    /// Releases the socket. Safe to call more than once.
    fn close(&mut self);
}

/// Factory for discovery sessions.
///
/// The production implementation is [`MulticastTransport`]; tests drive the
/// worker with [`mock::MockTransport`](super::mock::MockTransport) instead.
pub trait DiscoveryTransport: Send {
    type Session: DiscoverySession;

    /// Opens a fresh session: socket creation, wildcard bind, TTL, and group
    /// membership. On failure the partially-created socket is released
    /// before the error is returned.
    fn open(&self) -> Result<Self::Session, TransportError>;
}

/// Production transport over [`std::net::UdpSocket`].
#[derive(Debug, Clone)]
pub struct MulticastTransport {
    group: String,
    port: u16,
}

impl MulticastTransport {
    /// Creates a transport for the given group address and port. The group
    /// string is parsed on every [`open`](DiscoveryTransport::open), not
    /// here, so a bad address surfaces the same way as any other open
    /// failure.
    pub fn new(group: impl Into<String>, port: u16) -> Self {
        Self {
            group: group.into(),
            port,
        }
    }
}

impl DiscoveryTransport for MulticastTransport {
    type Session = MulticastSession;

    fn open(&self) -> Result<MulticastSession, TransportError> {
        let group: Ipv4Addr = self
            .group
            .parse()
            .map_err(|_| TransportError::InvalidGroupAddress(self.group.clone()))?;

        if !group.is_multicast() {
            warn!(
                "configured group address {group} is outside the multicast range; \
                 discovery will probably not work"
            );
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port)).map_err(|source| {
            TransportError::Bind {
                port: self.port,
                source,
            }
        })?;

        // TTL 0: discovery datagrams are never routed off the local segment.
        socket
            .set_multicast_ttl_v4(0)
            .map_err(TransportError::Configure)?;

        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .map_err(|source| TransportError::Membership { group, source })?;

        debug!("joined multicast group {group} on port {}", self.port);

        Ok(MulticastSession {
            socket: Some(socket),
            port: self.port,
        })
    }
}

/// A live multicast socket. Dropping or closing the session releases it.
pub struct MulticastSession {
    socket: Option<UdpSocket>,
    port: u16,
}

impl MulticastSession {
    /// The address the session's socket is bound to, while it is open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl DiscoverySession for MulticastSession {
    fn receive(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| TransportError::Receive(session_closed()))?;

        socket
            .set_read_timeout(Some(timeout))
            .map_err(TransportError::Receive)?;

        let mut buf = [0u8; RECV_BUFFER_LEN];
        match socket.recv_from(&mut buf) {
            Ok((len, sender)) => Ok(Some((buf[..len].to_vec(), sender))),
            Err(e) if is_timeout_error(&e) => Ok(None),
            Err(e) => Err(TransportError::Receive(e)),
        }
    }

    fn send_to(&mut self, payload: &[u8], destination: &str) -> Result<usize, TransportError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| TransportError::Send(session_closed()))?;

        let addr = resolve_destination(destination, self.port)?;
        debug!("snd {payload:02x?} to {addr}");
        socket.send_to(payload, addr).map_err(TransportError::Send)
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("discovery socket closed");
        }
    }
}

/// Resolves `destination` (hostname or IP literal) to an IPv4 socket address
/// on `port`. The caller's port, not the peer's, always wins.
fn resolve_destination(destination: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let mut addrs = (destination, port)
        .to_socket_addrs()
        .map_err(|_| TransportError::Resolve(destination.to_string()))?;
    addrs
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| TransportError::Resolve(destination.to_string()))
}

/// Returns `true` for OS timeout / would-block errors that mean "the receive
/// window elapsed" rather than a socket fault.
fn is_timeout_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn session_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "session already closed")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Picks a free UDP port by binding port 0 and reading back the
    /// OS-assigned port.
    fn free_port() -> u16 {
        let probe = UdpSocket::bind("0.0.0.0:0").expect("probe bind");
        let port = probe.local_addr().unwrap().port();
        drop(probe); // release the port before re-binding
        port
    }

    /// Opens a session on a free port, or `None` when the environment has no
    /// route for multicast membership (stripped CI sandboxes).
    fn open_session(transport: &MulticastTransport) -> Option<MulticastSession> {
        match transport.open() {
            Ok(session) => Some(session),
            Err(TransportError::Membership { .. }) => None,
            Err(e) => panic!("unexpected open failure: {e}"),
        }
    }

    #[test]
    fn test_is_timeout_error_recognises_timed_out() {
        let e = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert!(is_timeout_error(&e));
    }

    #[test]
    fn test_is_timeout_error_recognises_would_block() {
        let e = io::Error::new(io::ErrorKind::WouldBlock, "would block");
        assert!(is_timeout_error(&e));
    }

    #[test]
    fn test_is_timeout_error_returns_false_for_other_errors() {
        let e = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_timeout_error(&e));
    }

    #[test]
    fn test_resolve_destination_accepts_ip_literal() {
        // Arrange / Act
        let addr = resolve_destination("127.0.0.1", 4446).expect("resolve");

        // Assert – the configured port always wins
        assert_eq!(addr, "127.0.0.1:4446".parse().unwrap());
    }

    #[test]
    fn test_resolve_destination_rejects_empty_host() {
        let result = resolve_destination("", 4446);
        assert!(matches!(result, Err(TransportError::Resolve(_))));
    }

    #[test]
    fn test_open_rejects_unparseable_group_address() {
        // Arrange
        let transport = MulticastTransport::new("not-an-ip", free_port());

        // Act / Assert
        assert!(matches!(
            transport.open(),
            Err(TransportError::InvalidGroupAddress(_))
        ));
    }

    #[test]
    fn test_open_binds_and_close_is_idempotent() {
        // Arrange
        let transport = MulticastTransport::new("230.0.0.0", free_port());

        // Act
        let Some(mut session) = open_session(&transport) else {
            return;
        };

        // Assert
        assert!(session.local_addr().is_some());
        session.close();
        session.close(); // second close must be a no-op
        assert!(session.local_addr().is_none());
    }

    #[test]
    fn test_receive_times_out_with_none() {
        // Arrange
        let transport = MulticastTransport::new("230.0.0.0", free_port());
        let Some(mut session) = open_session(&transport) else {
            return;
        };

        // Act – nobody is sending to this freshly-bound port
        let result = session.receive(Duration::from_millis(50));

        // Assert
        assert!(matches!(result, Ok(None)), "timeout must not be an error");
    }

    #[test]
    fn test_open_fails_with_bind_error_when_port_taken() {
        // Arrange
        let transport = MulticastTransport::new("230.0.0.0", free_port());
        let Some(_session) = open_session(&transport) else {
            return;
        };

        // Act – same port, no SO_REUSEADDR
        let second = transport.open();

        // Assert
        assert!(matches!(second, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_receive_after_close_is_a_hard_error() {
        let transport = MulticastTransport::new("230.0.0.0", free_port());
        let Some(mut session) = open_session(&transport) else {
            return;
        };
        session.close();

        let result = session.receive(Duration::from_millis(10));
        assert!(matches!(result, Err(TransportError::Receive(_))));
    }

    #[test]
    fn test_open_with_unicast_group_address_does_not_panic() {
        // A non-multicast group is warned about and then handed to the join
        // call; whether the OS accepts it is platform-dependent, so only the
        // absence of a panic is asserted here.
        let transport = MulticastTransport::new("192.0.2.1", free_port());
        let _ = transport.open();
    }

    #[test]
    #[ignore = "requires multicast loopback on the default interface"]
    fn test_datagram_sent_to_group_loops_back_to_sender() {
        // Arrange
        let transport = MulticastTransport::new("230.0.0.0", free_port());
        let mut session = transport.open().expect("open");

        // Act – multicast loopback delivers our own datagram back to us
        session.send_to(&[0x00, 0x2A], "230.0.0.0").expect("send");
        let received = session.receive(Duration::from_millis(500)).expect("receive");

        // Assert
        let (bytes, _sender) = received.expect("datagram must loop back");
        assert_eq!(bytes, vec![0x00, 0x2A]);
    }
}

//! Device discovery over UDP IPv4 multicast.
//!
//! A CamNode unit makes itself known to the controller on the local network
//! through a lightweight probe/acknowledge exchange:
//!
//! 1. While nothing is heard, the worker sends a probe ("are you there?") to
//!    the multicast group once per receive window.
//! 2. A controller probe is answered with an acknowledge ("here I am") to the
//!    controller's address.
//! 3. A controller acknowledge is answered with an acknowledge of our own;
//!    once that reply is on the wire, the handshake is complete and the node
//!    goes quiet until the session is torn down.
//!
//! The exchange is best effort: datagrams may be lost, duplicated, or
//! reordered, and the state machine re-derives its state from each message
//! rather than accumulating history. Any socket fault closes the session; a
//! fresh socket is created on the next pass, so the worker survives every
//! transient network failure.

pub mod mock;
pub mod transport;
pub mod worker;

pub use transport::{
    DiscoverySession, DiscoveryTransport, MulticastSession, MulticastTransport, TransportError,
};
pub use worker::{DiscoverySettings, DiscoveryWorker, HandshakeState, SessionEnd};

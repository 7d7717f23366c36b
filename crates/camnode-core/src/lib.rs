//! # camnode-core
//!
//! Shared library for CamNode containing the discovery wire protocol.
//!
//! This crate is used by the device daemon and by any controller-side
//! tooling that wants to speak the discovery protocol. It has zero
//! dependencies on OS APIs, network sockets, or async runtimes.
//!
//! CamNode units announce themselves on the local network over UDP IPv4
//! multicast. Each datagram is a single 2-byte [`protocol::DiscoveryMessage`]:
//! a probe ("are you there?"), or an acknowledge ("here I am"). The codec in
//! [`protocol::codec`] packs and unpacks that message; everything stateful
//! (sockets, timers, the handshake) lives in the daemon crate.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `camnode_core::DiscoveryMessage` instead of the full module path.
pub use protocol::codec::{decode_message, encode_message, DecodeError};
pub use protocol::messages::{DiscoveryMessage, DEVICE_ID_MAX, MESSAGE_LEN};

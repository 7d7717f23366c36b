//! Discovery message type and wire constants.
//!
//! A discovery exchange uses exactly one message shape. The two roles differ
//! only in the flag bits they set:
//!
//! - **Probe** (`alive = false`): "are you there?" — sent periodically by a
//!   party that has not yet heard from a peer.
//! - **Acknowledge** (`alive = true`): "here I am" — sent in reply to a probe
//!   or to a peer's acknowledge.

/// Exact length of a discovery datagram in bytes.
pub const MESSAGE_LEN: usize = 2;

/// Largest encodable device identifier (12 bits).
pub const DEVICE_ID_MAX: u16 = 0x0FFF;

/// The unit of exchange on the discovery multicast group.
///
/// Wire encoding is exactly [`MESSAGE_LEN`] bytes; see
/// [`codec`](crate::protocol::codec) for the bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryMessage {
    /// Claimed origin of the message: `true` when the sender claims the
    /// controlling/server role. A device clears this bit on everything it
    /// sends, and treats any message with the bit set as not its own.
    pub source_is_server: bool,
    /// `false` = probe ("are you there?"), `true` = acknowledge ("here I am").
    pub alive: bool,
    /// Identifier of the sending device, `0..=4095`. `0` may be used as an
    /// any-device sentinel on probes; receivers do not interpret it.
    pub device_id: u16,
}

impl DiscoveryMessage {
    /// A device-originated probe carrying `device_id`.
    pub fn probe(device_id: u16) -> Self {
        Self {
            source_is_server: false,
            alive: false,
            device_id,
        }
    }

    /// A device-originated acknowledge carrying `device_id`.
    pub fn acknowledge(device_id: u16) -> Self {
        Self {
            source_is_server: false,
            alive: true,
            device_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_constructor_clears_flags() {
        let msg = DiscoveryMessage::probe(42);
        assert!(!msg.source_is_server);
        assert!(!msg.alive);
        assert_eq!(msg.device_id, 42);
    }

    #[test]
    fn test_acknowledge_constructor_sets_alive_only() {
        let msg = DiscoveryMessage::acknowledge(7);
        assert!(!msg.source_is_server);
        assert!(msg.alive);
        assert_eq!(msg.device_id, 7);
    }

    #[test]
    fn test_device_id_max_is_twelve_bits() {
        assert_eq!(DEVICE_ID_MAX, 4095);
    }
}

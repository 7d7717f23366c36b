//! Binary codec for encoding and decoding discovery messages.
//!
//! Wire format (2 bytes):
//! ```text
//! byte 0 ("hi"): [source:1][alive:1][reserved:2][device_id bits 11..8:4]
//! byte 1 ("lo"): [device_id bits 7..0:8]
//! ```
//! Bit 7 of byte 0 is the claimed-origin flag, bit 6 the alive flag; bits 5
//! and 4 are unused and always encoded as zero.

use thiserror::Error;

use crate::protocol::messages::{DiscoveryMessage, MESSAGE_LEN};

// Bit positions within byte 0.
const BIT_SOURCE: u8 = 0x80;
const BIT_ALIVE: u8 = 0x40;
const BIT_ID_HI: u8 = 0x0F;

/// Errors that can occur while decoding a discovery datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The datagram is not exactly [`MESSAGE_LEN`] bytes long.
    #[error("invalid datagram length: expected {MESSAGE_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Encodes a [`DiscoveryMessage`] into its 2-byte wire form.
///
/// This is a total function: every message value has an encoding. The caller
/// is responsible for keeping `device_id` within
/// [`DEVICE_ID_MAX`](crate::protocol::messages::DEVICE_ID_MAX); out-of-range
/// ids are masked to their low 12 bits here so that stray high bits can never
/// leak into the flag positions.
///
/// # Examples
///
/// ```rust
/// use camnode_core::{decode_message, encode_message, DiscoveryMessage};
///
/// let msg = DiscoveryMessage::probe(42);
/// let bytes = encode_message(&msg);
/// assert_eq!(bytes, [0x00, 0x2A]);
/// assert_eq!(decode_message(&bytes).unwrap(), msg);
/// ```
pub fn encode_message(msg: &DiscoveryMessage) -> [u8; MESSAGE_LEN] {
    let mut hi = ((msg.device_id >> 8) as u8) & BIT_ID_HI;
    if msg.source_is_server {
        hi |= BIT_SOURCE;
    }
    if msg.alive {
        hi |= BIT_ALIVE;
    }
    let lo = (msg.device_id & 0xFF) as u8;
    [hi, lo]
}

/// Decodes one [`DiscoveryMessage`] from a received datagram.
///
/// Field extraction is pure bit masking; the reserved bits 5..4 of byte 0
/// are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] unless `bytes` is exactly
/// [`MESSAGE_LEN`] bytes.
pub fn decode_message(bytes: &[u8]) -> Result<DiscoveryMessage, DecodeError> {
    if bytes.len() != MESSAGE_LEN {
        return Err(DecodeError::InvalidLength(bytes.len()));
    }

    let hi = bytes[0];
    let lo = bytes[1];

    Ok(DiscoveryMessage {
        source_is_server: (hi & BIT_SOURCE) != 0,
        alive: (hi & BIT_ALIVE) != 0,
        device_id: (((hi & BIT_ID_HI) as u16) << 8) | lo as u16,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

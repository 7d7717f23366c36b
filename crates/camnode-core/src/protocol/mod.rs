//! Protocol module containing the discovery message type and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_message, encode_message, DecodeError};
pub use messages::*;

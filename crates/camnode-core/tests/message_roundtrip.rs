//! Integration tests for the camnode-core discovery codec.
//!
//! These tests verify complete round-trip encoding and decoding through the
//! public crate API, including the golden wire bytes a controller on the
//! multicast group would observe.

use camnode_core::{decode_message, encode_message, DecodeError, DiscoveryMessage, DEVICE_ID_MAX};

/// Encodes a message and then decodes it, asserting that the decoded message
/// matches the original.
fn roundtrip(msg: DiscoveryMessage) -> DiscoveryMessage {
    let bytes = encode_message(&msg);
    decode_message(&bytes).expect("decode must succeed")
}

#[test]
fn test_roundtrip_device_probe() {
    let original = DiscoveryMessage::probe(42);
    assert_eq!(original, roundtrip(original));
}

#[test]
fn test_roundtrip_device_acknowledge() {
    let original = DiscoveryMessage::acknowledge(42);
    assert_eq!(original, roundtrip(original));
}

#[test]
fn test_roundtrip_server_probe() {
    let original = DiscoveryMessage {
        source_is_server: true,
        alive: false,
        device_id: 0,
    };
    assert_eq!(original, roundtrip(original));
}

#[test]
fn test_roundtrip_server_acknowledge() {
    let original = DiscoveryMessage {
        source_is_server: true,
        alive: true,
        device_id: 7,
    };
    assert_eq!(original, roundtrip(original));
}

#[test]
fn test_roundtrip_every_boundary_device_id() {
    for device_id in [0, 1, 0x0FF, 0x100, 0x7FF, 0x800, DEVICE_ID_MAX] {
        let original = DiscoveryMessage {
            source_is_server: false,
            alive: true,
            device_id,
        };
        assert_eq!(original, roundtrip(original), "device_id {device_id}");
    }
}

#[test]
fn test_probe_wire_bytes_match_protocol_documentation() {
    // device_id 42 = 0x02A → hi nibble 0x0, lo byte 0x2A, flags clear.
    assert_eq!(encode_message(&DiscoveryMessage::probe(42)), [0x00, 0x2A]);
    // device_id 4095 = 0xFFF fills the id field completely.
    assert_eq!(
        encode_message(&DiscoveryMessage::probe(DEVICE_ID_MAX)),
        [0x0F, 0xFF]
    );
}

#[test]
fn test_decode_rejects_every_wrong_length_up_to_mtu() {
    for len in (0..=64).filter(|&len| len != 2) {
        let buf = vec![0u8; len];
        assert_eq!(
            decode_message(&buf),
            Err(DecodeError::InvalidLength(len)),
            "length {len} must be rejected"
        );
    }
}

//! DHT wire header: 105 bytes, signed, optionally encrypted at the payload
//! layer. Big-endian on the wire for everything except the timestamp,
//! which the wire format fixes as little-endian (matching the original
//! packed-struct layout); converted to host order only at parse time.

use crate::error::{NodeError, Result};

pub const HEADER_LEN: usize = 105;
pub const SENDER_PK_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

pub const TYPE_PING: u8 = 0;
pub const TYPE_PONG: u8 = 1;
pub const TYPE_FIND_NODE: u8 = 2;
pub const TYPE_FOUND_NODES: u8 = 3;
pub const TYPE_ANNOUNCE_PEER: u8 = 4;
pub const TYPE_GET_PEERS: u8 = 5;
pub const TYPE_PEERS: u8 = 6;

/// Any first byte at or above this belongs to UDX, not the DHT engine.
pub const DHT_TYPE_CEILING: u8 = 0x80;

#[derive(Clone, Copy, Debug)]
pub struct DhtHeader {
    pub msg_type: u8,
    pub sender_pk: [u8; SENDER_PK_LEN],
    pub timestamp_ms: u64,
    pub signature: [u8; SIGNATURE_LEN],
}

impl DhtHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.msg_type;
        out[1..33].copy_from_slice(&self.sender_pk);
        out[33..41].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        out[41..105].copy_from_slice(&self.signature);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(NodeError::TooShort);
        }
        let mut sender_pk = [0u8; SENDER_PK_LEN];
        sender_pk.copy_from_slice(&buf[1..33]);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&buf[41..105]);
        Ok(Self {
            msg_type: buf[0],
            sender_pk,
            timestamp_ms: u64::from_le_bytes(buf[33..41].try_into().unwrap()),
            signature,
        })
    }

    /// The bytes the signature covers: `type || sender_pk || timestamp ||
    /// payload`, all in their wire representation.
    pub fn signing_message(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(41 + payload.len());
        out.push(self.msg_type);
        out.extend_from_slice(&self.sender_pk);
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_bytes() {
        let header = DhtHeader {
            msg_type: TYPE_PING,
            sender_pk: [7u8; SENDER_PK_LEN],
            timestamp_ms: 1_700_000_000_000,
            signature: [9u8; SIGNATURE_LEN],
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        let parsed = DhtHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.msg_type, header.msg_type);
        assert_eq!(parsed.sender_pk, header.sender_pk);
        assert_eq!(parsed.timestamp_ms, header.timestamp_ms);
        assert_eq!(parsed.signature, header.signature);
    }

    #[test]
    fn too_short_is_rejected() {
        assert!(matches!(DhtHeader::from_bytes(&[0u8; 40]), Err(NodeError::TooShort)));
    }

    #[test]
    fn dht_types_are_below_the_udx_ceiling() {
        assert!(TYPE_PEERS < DHT_TYPE_CEILING);
    }
}

//! UDX wire header: 13 bytes, big-endian on the wire, host order once parsed.

use crate::error::{NodeError, Result};

pub const HEADER_LEN: usize = 13;

pub const TYPE_DATA: u8 = 0x80;
pub const TYPE_ACK: u8 = 0x81;
pub const TYPE_SYN: u8 = 0x82;
pub const TYPE_FIN: u8 = 0x83;
pub const TYPE_HOLEPUNCH: u8 = 0x84;

/// Any first byte below this belongs to the DHT protocol, not UDX.
pub const UDX_TYPE_FLOOR: u8 = 0x80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdxHeader {
    pub msg_type: u8,
    pub conn_id: u32,
    pub seq: u32,
    pub ack: u32,
}

impl UdxHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.msg_type;
        out[1..5].copy_from_slice(&self.conn_id.to_be_bytes());
        out[5..9].copy_from_slice(&self.seq.to_be_bytes());
        out[9..13].copy_from_slice(&self.ack.to_be_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(NodeError::TooShort);
        }
        Ok(Self {
            msg_type: buf[0],
            conn_id: u32::from_be_bytes(buf[1..5].try_into().unwrap()),
            seq: u32::from_be_bytes(buf[5..9].try_into().unwrap()),
            ack: u32::from_be_bytes(buf[9..13].try_into().unwrap()),
        })
    }

    pub fn is_reliable(&self) -> bool {
        matches!(self.msg_type, TYPE_DATA | TYPE_SYN | TYPE_FIN)
    }
}

//! UDX: the reliable datagram transport carried over the same UDP socket
//! as the DHT protocol. A first byte below [`UDX_TYPE_FLOOR`] belongs to
//! the DHT engine instead; the reactor is responsible for that dispatch,
//! not this module.
//!
//! Reliable sends (`DATA`/`SYN`/`FIN`) occupy one of [`MAX_PENDING`]
//! outstanding slots until acknowledged. [`Transport::tick`] retransmits
//! anything that has waited longer than `500ms * 2^retries`, up to 5
//! retries, after which the packet is given up as lost.

use std::net::{SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use lib_crypto::secretbox;

use crate::error::{NodeError, Result};
use crate::udx::header::{UdxHeader, HEADER_LEN, TYPE_ACK, TYPE_DATA};

pub const MAX_PENDING: usize = 32;
pub const MAX_RETRIES: u8 = 5;
pub const BASE_RETRANSMIT_MS: u64 = 500;

struct PendingSlot {
    seq: u32,
    msg_type: u8,
    dest: SocketAddrV4,
    conn_id: u32,
    payload: Vec<u8>,
    sent_at: Instant,
    retries: u8,
}

pub enum UdxEvent {
    Payload { conn_id: u32, seq: u32, data: Vec<u8> },
    Acked { seq: u32 },
    Holepunch { conn_id: u32 },
}

pub struct Transport {
    next_seq: u32,
    pending: Vec<Option<PendingSlot>>,
}

impl Transport {
    pub fn new() -> Self {
        Self { next_seq: 1, pending: (0..MAX_PENDING).map(|_| None).collect() }
    }

    fn take_free_slot(&self) -> Option<usize> {
        self.pending.iter().position(|s| s.is_none())
    }

    fn encode_payload(key: Option<&[u8; 32]>, seq: u32, payload: &[u8]) -> Vec<u8> {
        match key {
            Some(k) => secretbox::seal(k, &secretbox::nonce_from_sequence(seq), payload),
            None => payload.to_vec(),
        }
    }

    fn wire_bytes(header: UdxHeader, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Send a reliable (`DATA`) frame, reserving a pending slot until it's
    /// acknowledged. Returns `TableFull` if all slots are occupied.
    pub fn send_data(
        &mut self,
        socket: &UdpSocket,
        dest: SocketAddrV4,
        conn_id: u32,
        payload: &[u8],
        key: Option<&[u8; 32]>,
    ) -> Result<u32> {
        let slot_index = self.take_free_slot().ok_or(NodeError::TableFull)?;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1).max(1);

        let body = Self::encode_payload(key, seq, payload);
        let header = UdxHeader { msg_type: TYPE_DATA, conn_id, seq, ack: 0 };
        socket.send_to(&Self::wire_bytes(header, &body), dest)?;

        self.pending[slot_index] = Some(PendingSlot {
            seq,
            msg_type: TYPE_DATA,
            dest,
            conn_id,
            payload: body,
            sent_at: Instant::now(),
            retries: 0,
        });
        Ok(seq)
    }

    /// ACKs do not consume a sequence number or a pending slot.
    pub fn send_ack(&self, socket: &UdpSocket, dest: SocketAddrV4, conn_id: u32, ack_seq: u32) -> Result<()> {
        let header = UdxHeader { msg_type: TYPE_ACK, conn_id, seq: 0, ack: ack_seq };
        socket.send_to(&header.to_bytes(), dest)?;
        Ok(())
    }

    /// Parse an inbound frame whose first byte was already confirmed to be
    /// `>= UDX_TYPE_FLOOR`. `DATA`/`SYN` frames auto-ACK via `ack_sink`.
    pub fn handle_incoming(
        &mut self,
        buf: &[u8],
        key: Option<&[u8; 32]>,
        mut ack_sink: impl FnMut(u32, u32),
    ) -> Result<UdxEvent> {
        let header = UdxHeader::from_bytes(buf)?;
        let body = &buf[HEADER_LEN..];

        match header.msg_type {
            crate::udx::header::TYPE_ACK => {
                if let Some(slot) = self.pending.iter_mut().find(|s| matches!(s, Some(p) if p.seq == header.ack)) {
                    *slot = None;
                }
                Ok(UdxEvent::Acked { seq: header.ack })
            }
            crate::udx::header::TYPE_HOLEPUNCH => Ok(UdxEvent::Holepunch { conn_id: header.conn_id }),
            crate::udx::header::TYPE_DATA | crate::udx::header::TYPE_SYN | crate::udx::header::TYPE_FIN => {
                ack_sink(header.conn_id, header.seq);
                let data = match key {
                    Some(k) => secretbox::open(k, &secretbox::nonce_from_sequence(header.seq), body)?,
                    None => body.to_vec(),
                };
                Ok(UdxEvent::Payload { conn_id: header.conn_id, seq: header.seq, data })
            }
            _ => Err(NodeError::BadType),
        }
    }

    /// Resend anything past its backoff deadline; drop anything that has
    /// exhausted its retries.
    pub fn tick(&mut self, socket: &UdpSocket) {
        let now = Instant::now();
        for slot in self.pending.iter_mut() {
            let Some(pending) = slot else { continue };
            let deadline = Duration::from_millis(BASE_RETRANSMIT_MS * (1u64 << pending.retries));
            if now.duration_since(pending.sent_at) < deadline {
                continue;
            }
            if pending.retries >= MAX_RETRIES {
                *slot = None;
                continue;
            }
            pending.retries += 1;
            pending.sent_at = now;
            let header = UdxHeader { msg_type: pending.msg_type, conn_id: pending.conn_id, seq: pending.seq, ack: 0 };
            let _ = socket.send_to(&Self::wire_bytes(header, &pending.payload), pending.dest);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback_socket() -> UdpSocket {
        UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap()
    }

    #[test]
    fn send_data_reserves_a_pending_slot() {
        let mut t = Transport::new();
        let socket = loopback_socket();
        let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        t.send_data(&socket, dest, 1, b"hello", None).unwrap();
        assert_eq!(t.pending_count(), 1);
    }

    #[test]
    fn all_slots_full_returns_table_full() {
        let mut t = Transport::new();
        let socket = loopback_socket();
        let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        for _ in 0..MAX_PENDING {
            t.send_data(&socket, dest, 1, b"x", None).unwrap();
        }
        assert!(matches!(t.send_data(&socket, dest, 1, b"x", None), Err(NodeError::TableFull)));
    }

    #[test]
    fn ack_clears_the_pending_slot() {
        let mut t = Transport::new();
        let socket = loopback_socket();
        let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        let seq = t.send_data(&socket, dest, 9, b"payload", None).unwrap();
        assert_eq!(t.pending_count(), 1);

        let ack_header = UdxHeader { msg_type: TYPE_ACK, conn_id: 9, seq: 0, ack: seq };
        let event = t.handle_incoming(&ack_header.to_bytes(), None, |_, _| {}).unwrap();
        assert!(matches!(event, UdxEvent::Acked { seq: s } if s == seq));
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn encrypted_round_trip_via_secretbox() {
        let mut t = Transport::new();
        let socket = loopback_socket();
        let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        let key = [9u8; 32];
        let seq = t.send_data(&socket, dest, 1, b"secret payload", Some(&key)).unwrap();

        // Re-derive the frame as the peer would see it on the wire.
        let header = UdxHeader { msg_type: TYPE_DATA, conn_id: 1, seq, ack: 0 };
        let sealed = secretbox::seal(&key, &secretbox::nonce_from_sequence(seq), b"secret payload");
        let frame = Transport::wire_bytes(header, &sealed);

        let mut receiver = Transport::new();
        let event = receiver.handle_incoming(&frame, Some(&key), |_, _| {}).unwrap();
        match event {
            UdxEvent::Payload { data, .. } => assert_eq!(data, b"secret payload"),
            _ => panic!("expected payload event"),
        }
    }

    #[test]
    fn retransmit_schedule_matches_backoff() {
        let mut t = Transport::new();
        let socket = loopback_socket();
        let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        t.send_data(&socket, dest, 1, b"x", None).unwrap();

        // Force the deadline check by manipulating elapsed time is not
        // possible without sleeping; this checks the formula directly.
        let deadline_for_retry_0 = Duration::from_millis(BASE_RETRANSMIT_MS * (1u64 << 0));
        let deadline_for_retry_4 = Duration::from_millis(BASE_RETRANSMIT_MS * (1u64 << 4));
        assert_eq!(deadline_for_retry_0, Duration::from_millis(500));
        assert_eq!(deadline_for_retry_4, Duration::from_millis(8000));
    }
}

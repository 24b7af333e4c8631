//! NAT hole-punch state machine for a single candidate peer address.
//!
//! Idle until [`Driver::start`]. While punching, [`Driver::tick`] sends an
//! unencrypted `HOLEPUNCH` frame (the literal payload `b"HOLEPUNCH"`,
//! matching the peer we're trying to reach so both sides recognize the
//! probe) every 500ms, up to 10 attempts, after which the attempt is
//! marked `Failed`. Any datagram at all from the target address while
//! punching — not just a `HOLEPUNCH` frame — is treated as proof the path
//! is open and moves the state to `Connected`.

use std::net::{SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use crate::udx::header::{UdxHeader, TYPE_HOLEPUNCH};

pub const PUNCH_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_ATTEMPTS: u32 = 10;
pub const PUNCH_PAYLOAD: &[u8] = b"HOLEPUNCH";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Punching,
    Connected,
    Failed,
}

pub struct Driver {
    state: State,
    target: Option<SocketAddrV4>,
    attempts: u32,
    last_sent: Option<Instant>,
}

impl Driver {
    pub fn new() -> Self {
        Self { state: State::Idle, target: None, attempts: 0, last_sent: None }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn start(&mut self, target: SocketAddrV4) {
        self.state = State::Punching;
        self.target = Some(target);
        self.attempts = 0;
        self.last_sent = None;
    }

    /// Send another punch frame if due. No-op outside `Punching`.
    pub fn tick(&mut self, socket: &UdpSocket, conn_id: u32) {
        if self.state != State::Punching {
            return;
        }
        let Some(target) = self.target else { return };

        let due = match self.last_sent {
            None => true,
            Some(t) => t.elapsed() >= PUNCH_INTERVAL,
        };
        if !due {
            return;
        }

        if self.attempts >= MAX_ATTEMPTS {
            self.state = State::Failed;
            return;
        }

        let header = UdxHeader { msg_type: TYPE_HOLEPUNCH, conn_id, seq: 0, ack: 0 };
        let mut frame = header.to_bytes().to_vec();
        frame.extend_from_slice(PUNCH_PAYLOAD);
        let _ = socket.send_to(&frame, target);

        self.attempts += 1;
        self.last_sent = Some(Instant::now());
    }

    /// Any datagram received from `from` while punching closes the loop.
    pub fn on_packet_from(&mut self, from: SocketAddrV4) {
        if self.state == State::Punching && self.target == Some(from) {
            self.state = State::Connected;
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn target() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5555)
    }

    #[test]
    fn starts_idle_then_punching() {
        let mut d = Driver::new();
        assert_eq!(d.state(), State::Idle);
        d.start(target());
        assert_eq!(d.state(), State::Punching);
    }

    #[test]
    fn any_packet_from_target_while_punching_connects() {
        let mut d = Driver::new();
        d.start(target());
        d.on_packet_from(target());
        assert_eq!(d.state(), State::Connected);
    }

    #[test]
    fn packet_from_other_address_does_not_connect() {
        let mut d = Driver::new();
        d.start(target());
        d.on_packet_from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1));
        assert_eq!(d.state(), State::Punching);
    }

    #[test]
    fn exhausting_attempts_fails() {
        let mut d = Driver::new();
        d.attempts = MAX_ATTEMPTS;
        d.state = State::Punching;
        d.target = Some(target());
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        d.tick(&socket, 1);
        assert_eq!(d.state(), State::Failed);
    }
}

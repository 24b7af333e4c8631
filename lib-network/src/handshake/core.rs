//! Noise-XX-style three-message handshake: `e`, then `e, ee, s, es`, then
//! `s, se`. Each party ends up with a distinct transmit and receive key
//! derived from the X25519 shared secret `es` — the Diffie-Hellman of the
//! initiator's ephemeral key and the responder's static key, which both
//! sides can compute once the relevant public keys have crossed the wire.
//!
//! `ee` (ephemeral-ephemeral) is used only to wrap the responder's static
//! key in message 2; it plays no part in the final key split. Any
//! decryption failure along the way aborts the whole attempt back to
//! [`Stage::None`] rather than leaving a half-established state around.

use lib_crypto::classical::x25519::StaticKeypair;
use lib_crypto::{hash_blake2s, secretbox};

use crate::error::{NodeError, Result};

pub const STAGE_E: u8 = 0x01;
pub const STAGE_EE_S_ES: u8 = 0x02;
pub const STAGE_S_SE: u8 = 0x03;

const ZERO_NONCE: [u8; 24] = [0u8; 24];
const WRAPPED_STATIC_LEN: usize = 48; // 32-byte key + 16-byte Poly1305 tag

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    None,
    SentE,
    AwaitingS,
    Established,
}

pub struct HandshakeState {
    role: Role,
    stage: Stage,
    static_kp: StaticKeypair,
    ephemeral_kp: Option<StaticKeypair>,
    remote_static_pk: Option<[u8; 32]>,
    remote_ephemeral_pk: Option<[u8; 32]>,
    tx_key: Option<[u8; 32]>,
    rx_key: Option<[u8; 32]>,
    tx_nonce: u32,
    rx_nonce: u32,
}

impl HandshakeState {
    pub fn new(role: Role, static_kp: StaticKeypair) -> Self {
        Self {
            role,
            stage: Stage::None,
            static_kp,
            ephemeral_kp: None,
            remote_static_pk: None,
            remote_ephemeral_pk: None,
            tx_key: None,
            rx_key: None,
            tx_nonce: 0,
            rx_nonce: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_established(&self) -> bool {
        self.stage == Stage::Established
    }

    pub fn tx_key(&self) -> Option<[u8; 32]> {
        self.tx_key
    }

    pub fn rx_key(&self) -> Option<[u8; 32]> {
        self.rx_key
    }

    fn fail(&mut self) -> NodeError {
        self.stage = Stage::None;
        self.ephemeral_kp = None;
        NodeError::HandshakeFail
    }

    fn split_keys(&mut self, es: &[u8; 32]) {
        let mut k1_input = es.to_vec();
        k1_input.extend_from_slice(b"1");
        let mut k2_input = es.to_vec();
        k2_input.extend_from_slice(b"2");
        let k1 = hash_blake2s(&k1_input);
        let k2 = hash_blake2s(&k2_input);
        match self.role {
            Role::Initiator => {
                self.tx_key = Some(k1);
                self.rx_key = Some(k2);
            }
            Role::Responder => {
                self.tx_key = Some(k2);
                self.rx_key = Some(k1);
            }
        }
        self.tx_nonce = 0;
        self.rx_nonce = 0;
        self.stage = Stage::Established;
    }

    /// Initiator only: generate `e` and build message 1 (`0x01 || E`).
    pub fn start(&mut self) -> Result<Vec<u8>> {
        if self.role != Role::Initiator || self.stage != Stage::None {
            return Err(NodeError::HandshakeFail);
        }
        let ephemeral = StaticKeypair::generate()?;
        let mut out = vec![STAGE_E];
        out.extend_from_slice(&ephemeral.public_bytes());
        self.ephemeral_kp = Some(ephemeral);
        self.stage = Stage::SentE;
        Ok(out)
    }

    /// Feed one inbound handshake datagram. Returns the next outbound
    /// message, if the stage calls for one.
    pub fn handle_message(&mut self, buf: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(&tag) = buf.first() else { return Err(NodeError::TooShort) };
        match (self.role, self.stage, tag) {
            (Role::Responder, Stage::None, STAGE_E) => self.handle_message1(buf).map(Some),
            (Role::Initiator, Stage::SentE, STAGE_EE_S_ES) => self.handle_message2(buf).map(Some),
            (Role::Responder, Stage::AwaitingS, STAGE_S_SE) => {
                self.handle_message3(buf)?;
                Ok(None)
            }
            _ => Err(NodeError::HandshakeFail),
        }
    }

    /// Responder: receive `0x01 || E`, reply `0x02 || E' || Enc(k_s, S_resp)`.
    fn handle_message1(&mut self, buf: &[u8]) -> Result<Vec<u8>> {
        if buf.len() < 33 {
            return Err(NodeError::TooShort);
        }
        let mut remote_e = [0u8; 32];
        remote_e.copy_from_slice(&buf[1..33]);

        let ephemeral = StaticKeypair::generate()?;
        let ee = ephemeral.diffie_hellman(&remote_e);
        let k_s = hash_blake2s(&ee);
        let wrapped_static = secretbox::seal(&k_s, &ZERO_NONCE, &self.static_kp.public_bytes());

        let mut out = vec![STAGE_EE_S_ES];
        out.extend_from_slice(&ephemeral.public_bytes());
        out.extend_from_slice(&wrapped_static);

        self.remote_ephemeral_pk = Some(remote_e);
        self.ephemeral_kp = Some(ephemeral);
        self.stage = Stage::AwaitingS;
        Ok(out)
    }

    /// Initiator: receive `0x02 || E' || Enc(k_s, S_resp)`, reply
    /// `0x03 || Enc(k_s2, S_init)`.
    fn handle_message2(&mut self, buf: &[u8]) -> Result<Vec<u8>> {
        if buf.len() < 1 + 32 + WRAPPED_STATIC_LEN {
            return Err(NodeError::TooShort);
        }
        let mut remote_e = [0u8; 32];
        remote_e.copy_from_slice(&buf[1..33]);
        let wrapped_static = &buf[33..33 + WRAPPED_STATIC_LEN];

        let Some(ephemeral) = self.ephemeral_kp.take() else { return Err(self.fail()) };
        let ee = ephemeral.diffie_hellman(&remote_e);
        let k_s = hash_blake2s(&ee);
        let remote_static = secretbox::open(&k_s, &ZERO_NONCE, wrapped_static).map_err(|_| self.fail())?;
        if remote_static.len() != 32 {
            return Err(self.fail());
        }
        let mut remote_static_pk = [0u8; 32];
        remote_static_pk.copy_from_slice(&remote_static);

        let es = ephemeral.diffie_hellman(&remote_static_pk);
        let k_s2 = hash_blake2s(&es);
        let wrapped_local_static = secretbox::seal(&k_s2, &ZERO_NONCE, &self.static_kp.public_bytes());

        self.remote_static_pk = Some(remote_static_pk);
        self.remote_ephemeral_pk = Some(remote_e);
        self.split_keys(&es);

        let mut out = vec![STAGE_S_SE];
        out.extend_from_slice(&wrapped_local_static);
        Ok(out)
    }

    /// Responder: receive `0x03 || Enc(k_s2, S_init)`; nothing to send back.
    fn handle_message3(&mut self, buf: &[u8]) -> Result<()> {
        if buf.len() < 1 + WRAPPED_STATIC_LEN {
            return Err(NodeError::TooShort);
        }
        let wrapped_static = &buf[1..1 + WRAPPED_STATIC_LEN];
        let Some(remote_e) = self.remote_ephemeral_pk else { return Err(self.fail()) };

        let es = self.static_kp.diffie_hellman(&remote_e);
        let k_s2 = hash_blake2s(&es);
        let remote_static = secretbox::open(&k_s2, &ZERO_NONCE, wrapped_static).map_err(|_| self.fail())?;
        if remote_static.len() != 32 {
            return Err(self.fail());
        }
        let mut remote_static_pk = [0u8; 32];
        remote_static_pk.copy_from_slice(&remote_static);
        self.remote_static_pk = Some(remote_static_pk);

        self.split_keys(&es);
        Ok(())
    }

    pub fn remote_static_key(&self) -> Option<[u8; 32]> {
        self.remote_static_pk
    }
}

//! X25519 Diffie-Hellman keypairs.
//!
//! Used both for a node's long-lived static DH key (advertised alongside
//! its Ed25519 identity) and for the ephemeral keys generated per
//! handshake attempt.

use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::CryptoError;
use crate::random::SecureRng;

pub const PUBLIC_KEY_LEN: usize = 32;

/// Cloneable: a node reuses one static keypair across every handshake it
/// performs, rather than generating a new one per peer.
#[derive(Clone)]
pub struct StaticKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl StaticKeypair {
    pub fn generate() -> Result<Self, CryptoError> {
        let seed = SecureRng::generate_key()?;
        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public.to_bytes()
    }

    pub fn diffie_hellman(&self, their_public: &[u8; PUBLIC_KEY_LEN]) -> [u8; 32] {
        self.secret.diffie_hellman(&PublicKey::from(*their_public)).to_bytes()
    }
}

/// A single-use ephemeral keypair, consumed by `diffie_hellman`.
pub struct EphemeralKeypair {
    secret: Option<EphemeralSecret>,
    public: PublicKey,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        // EphemeralSecret deliberately has no from-seed constructor (it must
        // never be reconstructed or reused); it draws directly from the OS
        // CSPRNG via `rand_core::OsRng`.
        let secret = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { secret: Some(secret), public }
    }

    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public.to_bytes()
    }

    /// Consumes the ephemeral secret, as required by `x25519_dalek`'s API.
    pub fn diffie_hellman(mut self, their_public: &[u8; PUBLIC_KEY_LEN]) -> [u8; 32] {
        let secret = self.secret.take().expect("diffie_hellman called twice");
        secret.diffie_hellman(&PublicKey::from(*their_public)).to_bytes()
    }
}

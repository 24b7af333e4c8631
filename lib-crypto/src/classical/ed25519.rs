//! Ed25519 signing identity.
//!
//! A node's long-lived identity on the wire is its Ed25519 verifying key
//! (32 bytes), used both as the DHT node id and to authenticate every
//! packet it sends. There is no dummy-signature path: code that has not
//! been handed a [`SigningIdentity`] cannot produce a [`Signature`] at all.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::CryptoError;
use crate::random::SecureRng;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

pub struct SigningIdentity {
    signing_key: SigningKey,
}

impl SigningIdentity {
    /// Generate a fresh identity from the OS CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let seed = SecureRng::generate_key()?;
        Ok(Self::from_seed(&seed))
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(seed) }
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

/// Verify `signature` over `message` under `public_key`. Returns `false`
/// for malformed keys/signatures rather than erroring, since callers treat
/// "does not verify" and "cannot even be parsed" identically (drop the packet).
pub fn verify(message: &[u8], signature: &Signature, public_key: &[u8; PUBLIC_KEY_LEN]) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).is_ok()
}

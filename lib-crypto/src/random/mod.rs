//! Secure random number generation.
//!
//! Wraps the OS CSPRNG only. The embedded-node prototype this module
//! descends from fell back to a non-cryptographic RNG when the OS source
//! failed; that fallback is gone. A CSPRNG failure here is fatal to the
//! caller, never silently downgraded.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

pub struct SecureRng;

impl SecureRng {
    /// Fill `dest` with CSPRNG output. Returns `RngFailure` if the OS source
    /// is unavailable; callers must not substitute a weaker generator.
    pub fn fill(dest: &mut [u8]) -> Result<(), CryptoError> {
        OsRng.try_fill_bytes(dest).map_err(|_| CryptoError::RngFailure)
    }

    pub fn generate_key() -> Result<[u8; 32], CryptoError> {
        let mut key = [0u8; 32];
        Self::fill(&mut key)?;
        Ok(key)
    }

    pub fn generate_nonce12() -> Result<[u8; 12], CryptoError> {
        let mut nonce = [0u8; 12];
        Self::fill(&mut nonce)?;
        Ok(nonce)
    }

    pub fn generate_nonce24() -> Result<[u8; 24], CryptoError> {
        let mut nonce = [0u8; 24];
        Self::fill(&mut nonce)?;
        Ok(nonce)
    }

    pub fn generate_u64() -> Result<u64, CryptoError> {
        let mut buf = [0u8; 8];
        Self::fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

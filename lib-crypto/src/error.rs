//! Crypto-layer error type.
//!
//! Kept separate from the node-level error enum in lib-network so this crate
//! has no dependency on the transport/overlay layer above it.

use std::fmt;

#[derive(Debug)]
pub enum CryptoError {
    /// AEAD/secretbox authentication failed, or a signature did not verify.
    DecryptFail,
    BadSignature,
    /// The OS CSPRNG failed to produce bytes. Treated as fatal by callers;
    /// there is no degraded fallback.
    RngFailure,
    InvalidKeyLength,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::DecryptFail => write!(f, "decryption or authentication failed"),
            CryptoError::BadSignature => write!(f, "signature verification failed"),
            CryptoError::RngFailure => write!(f, "secure random number generator failed"),
            CryptoError::InvalidKeyLength => write!(f, "key material has the wrong length"),
        }
    }
}

impl std::error::Error for CryptoError {}

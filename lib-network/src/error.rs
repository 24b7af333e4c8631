//! Node-level error type.
//!
//! Every fallible operation on the public node API resolves to one of
//! these kinds. Packet parsing and cryptographic failures on the receive
//! path are not surfaced as errors at all — they are dropped silently by
//! the reactor — this type exists for host-facing calls and for the
//! internal plumbing that needs to distinguish failure causes before
//! deciding whether a drop is appropriate.

use std::fmt;
use std::io;

use lib_crypto::CryptoError;

#[derive(Debug)]
pub enum NodeError {
    /// A datagram was shorter than its fixed header.
    TooShort,
    /// The first byte of a datagram did not match any known message type.
    BadType,
    /// Ed25519 signature verification failed.
    BadSignature,
    /// AEAD/secretbox authentication failed.
    DecryptFail,
    /// The Noise-style handshake could not proceed (wrong message for the
    /// current stage, or a decryption failure inside the handshake itself).
    HandshakeFail,
    /// A k-bucket (or the topic peer store) was full and the new entry was
    /// dropped rather than evicting an existing one.
    TableFull,
    SocketError(io::Error),
    /// The OS CSPRNG failed. Fatal: there is no insecure fallback path.
    RngFailure,
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::TooShort => write!(f, "packet shorter than its header"),
            NodeError::BadType => write!(f, "unrecognized message type"),
            NodeError::BadSignature => write!(f, "signature verification failed"),
            NodeError::DecryptFail => write!(f, "decryption or authentication failed"),
            NodeError::HandshakeFail => write!(f, "handshake could not proceed"),
            NodeError::TableFull => write!(f, "table full, entry dropped"),
            NodeError::SocketError(e) => write!(f, "socket error: {e}"),
            NodeError::RngFailure => write!(f, "secure random number generator failed"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<io::Error> for NodeError {
    fn from(e: io::Error) -> Self {
        NodeError::SocketError(e)
    }
}

impl From<CryptoError> for NodeError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DecryptFail => NodeError::DecryptFail,
            CryptoError::BadSignature => NodeError::BadSignature,
            CryptoError::RngFailure => NodeError::RngFailure,
            CryptoError::InvalidKeyLength => NodeError::TooShort,
        }
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;

//! Cryptographic primitives for the overlay node: secure randomness, the
//! raw ChaCha20 keystream used to optionally wrap DHT traffic, Ed25519
//! node identity and signing, X25519 Diffie-Hellman for the handshake,
//! BLAKE2s/BLAKE3 hashing, and XSalsa20-Poly1305 secretbox sealing.

pub mod classical;
pub mod error;
pub mod hashing;
pub mod random;
pub mod secretbox;
pub mod symmetric;

pub use classical::{
    verify as ed25519_verify, EphemeralKeypair, Signature as Ed25519Signature, SigningIdentity,
    StaticKeypair,
};
pub use error::CryptoError;
pub use hashing::blake2::hash_blake2s;
pub use hashing::hash_blake3;
pub use random::SecureRng;
pub use symmetric::chacha20::{chacha20_block, chacha20_xor, decrypt as chacha20_decrypt, encrypt as chacha20_encrypt};

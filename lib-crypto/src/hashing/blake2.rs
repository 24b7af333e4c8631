//! BLAKE2s-256 hashing for the handshake key schedule.
//!
//! Kept separate from [`super::hash_blake3`], which remains the general
//! content hash used elsewhere; the handshake specifically needs a
//! 32-byte BLAKE2 digest to mirror the reference implementation's
//! `crypto_generichash`.

use blake2::{Blake2s256, Digest};

pub fn hash_blake2s(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn hash_blake2s_multiple(segments: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    for segment in segments {
        hasher.update(segment);
    }
    hasher.finalize().into()
}

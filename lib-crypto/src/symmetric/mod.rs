//! Symmetric cryptography: the raw ChaCha20 keystream cipher.

pub mod chacha20;

pub use chacha20::*;

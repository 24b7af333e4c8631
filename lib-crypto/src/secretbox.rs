//! XSalsa20-Poly1305 "secretbox" authenticated encryption.
//!
//! Used in two places elsewhere in this crate family: the Noise-style
//! handshake encrypts each party's static public key under the DH secret
//! negotiated so far (with an all-zero nonce — safe here because each
//! handshake derives a fresh key, so the (key, nonce) pair is never reused),
//! and the UDX transport encrypts each datagram's payload under a
//! per-connection key with a nonce derived from the packet's sequence
//! number.

use xsalsa20poly1305::aead::{Aead, KeyInit, Payload};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;

pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Vec<u8> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .expect("secretbox encryption is infallible for well-formed inputs")
}

pub fn open(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| CryptoError::DecryptFail)
}

/// Build the 24-byte nonce UDX uses: the 4-byte sequence number, zero-padded.
pub fn nonce_from_sequence(seq: u32) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..4].copy_from_slice(&seq.to_le_bytes());
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = [3u8; KEY_LEN];
        let nonce = [0u8; NONCE_LEN];
        let plaintext = b"hyperswarm frame payload";
        let ct = seal(&key, &nonce, plaintext);
        let pt = open(&key, &nonce, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let key = [3u8; KEY_LEN];
        let nonce = [1u8; NONCE_LEN];
        let mut ct = seal(&key, &nonce, b"payload");
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert!(open(&key, &nonce, &ct).is_err());
    }

    #[test]
    fn sequence_nonce_is_zero_extended() {
        let nonce = nonce_from_sequence(0x0102_0304);
        assert_eq!(&nonce[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert!(nonce[4..].iter().all(|&b| b == 0));
    }
}

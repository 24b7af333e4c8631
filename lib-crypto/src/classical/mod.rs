//! Classical (non-post-quantum) asymmetric primitives: Ed25519 node
//! identity/signing and X25519 Diffie-Hellman for the handshake.

pub mod ed25519;
pub mod x25519;

pub use ed25519::*;
pub use x25519::*;

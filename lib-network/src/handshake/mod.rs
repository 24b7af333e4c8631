//! Noise-XX-style handshake used to establish a transport session between
//! two nodes before UDX traffic flows between them.

pub mod core;

pub use core::{HandshakeState, Role, Stage, STAGE_E, STAGE_EE_S_ES, STAGE_S_SE};

//! The DHT Protocol Engine: wire header, per-message payload codecs, and
//! the signing/dispatch engine itself.

pub mod header;
pub mod messages;
pub mod protocol;

pub use header::{DhtHeader, DHT_TYPE_CEILING, HEADER_LEN};
pub use protocol::{DhtEngine, DhtEvent, Outcome, REPLAY_WINDOW_MS};

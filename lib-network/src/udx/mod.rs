//! Reliable datagram transport carried alongside the DHT protocol on the
//! same UDP socket.

pub mod header;
pub mod transport;

pub use header::{UdxHeader, HEADER_LEN, TYPE_ACK, TYPE_DATA, TYPE_FIN, TYPE_HOLEPUNCH, TYPE_SYN, UDX_TYPE_FLOOR};
pub use transport::{Transport, UdxEvent, MAX_PENDING, MAX_RETRIES};

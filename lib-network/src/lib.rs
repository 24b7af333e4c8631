//! Overlay node networking.
//!
//! A node speaks two protocols over one UDP socket: a signed Kademlia-style
//! DHT (routing, topic-based peer discovery) and UDX, a reliable datagram
//! transport used once a Noise-XX-style handshake has established a
//! session with a peer. [`reactor::Reactor`] owns the socket; [`node::Node`]
//! is the orchestrator a host application drives with `join`/`leave`/`tick`.

pub mod dht;
pub mod error;
pub mod handshake;
pub mod holepunch;
pub mod node;
pub mod reactor;
pub mod routing;
pub mod topics;
pub mod udx;

pub use dht::{DhtEngine, DhtEvent};
pub use error::{NodeError, Result};
pub use handshake::{HandshakeState, Role as HandshakeRole};
pub use node::{Node, NodeEvent, NodeIdentity};
pub use reactor::Reactor;
pub use routing::{NodeId, RoutingTable};
pub use topics::TopicPeerStore;

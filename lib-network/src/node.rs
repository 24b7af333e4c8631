//! Node Orchestrator: the piece that owns a bound socket and ties the DHT
//! engine, UDX transport, hole-punch drivers, and per-peer handshakes
//! together into something a host application can drive with `join`,
//! `leave`, and a periodic `tick`.
//!
//! Handshake messages are never sent as bare top-level datagrams — their
//! stage tags (`0x01..0x03`) collide with the DHT's own low message-type
//! range. Instead a handshake rides inside a UDX `DATA` frame's payload,
//! the same way application data eventually will once the session is
//! established; only the DHT engine's own PING/FIND_NODE/etc. frames go
//! out as bare datagrams.

use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use lib_crypto::{SigningIdentity, StaticKeypair};

use crate::dht::{DhtEngine, DhtEvent, DHT_TYPE_CEILING};
use crate::error::Result;
use crate::handshake::{HandshakeState, Role};
use crate::holepunch::{self, Driver};
use crate::reactor::Reactor;
use crate::routing::{NodeId, RoutingTable};
use crate::topics::TopicPeerStore;
use crate::udx::header::UDX_TYPE_FLOOR;
use crate::udx::{Transport, UdxEvent};

/// How many of the closest known contacts a `join` fans out to.
const JOIN_FANOUT: usize = 8;
/// Maintenance cadence for retransmits, hole-punch probes, and lookup
/// expiry — driven by the host application calling [`Node::tick`].
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

pub struct NodeIdentity {
    pub signing: SigningIdentity,
    pub dh: StaticKeypair,
}

impl NodeIdentity {
    pub fn generate() -> Result<Self> {
        Ok(Self { signing: SigningIdentity::generate()?, dh: StaticKeypair::generate()? })
    }

    pub fn node_id(&self) -> NodeId {
        NodeId(self.signing.public_key())
    }
}

/// Everything the orchestrator tracks about one remote address that isn't
/// a plain DHT contact: its handshake progress and its hole-punch state.
struct PeerSession {
    conn_id: u32,
    handshake: HandshakeState,
    holepunch: Driver,
    session_key: Option<([u8; 32], [u8; 32])>, // (tx, rx), set once established
}

/// Application-visible outcome of draining one round of inbound traffic.
pub enum NodeEvent {
    /// A `PEERS` response arrived for a topic lookup.
    TopicPeers { info_hash: [u8; 32], peers: Vec<SocketAddrV4> },
    /// A handshake with `peer` completed and the transport session key is
    /// now established.
    HandshakeEstablished { peer: SocketAddrV4 },
    /// Decrypted application payload arrived over an established session.
    Data { peer: SocketAddrV4, data: Vec<u8> },
}

pub struct Node {
    node_id: NodeId,
    /// The node's long-lived X25519 identity, reused as `S` across every
    /// handshake it performs (the Ed25519 signing key went into `dht`).
    static_kp: StaticKeypair,
    reactor: Reactor,
    dht: DhtEngine,
    routing: Arc<RoutingTable>,
    topics: Arc<TopicPeerStore>,
    udx: Mutex<Transport>,
    peers: Mutex<HashMap<SocketAddrV4, PeerSession>>,
    bootstrap: Vec<SocketAddrV4>,
    next_conn_id: Mutex<u32>,
}

impl Node {
    pub fn bind(
        bind_addr: SocketAddrV4,
        identity: NodeIdentity,
        network_key: Option<[u8; 32]>,
        bootstrap: Vec<SocketAddrV4>,
    ) -> Result<Self> {
        let node_id = identity.node_id();
        let routing = Arc::new(RoutingTable::new(node_id));
        let topics = Arc::new(TopicPeerStore::new());
        let reactor = Reactor::bind(bind_addr)?;
        let static_kp = identity.dh.clone();

        let dht = DhtEngine::new(identity.signing, Arc::clone(&routing), Arc::clone(&topics), network_key);

        Ok(Self {
            node_id,
            static_kp,
            reactor,
            dht,
            routing,
            topics,
            udx: Mutex::new(Transport::new()),
            peers: Mutex::new(HashMap::new()),
            bootstrap,
            next_conn_id: Mutex::new(1),
        })
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.reactor.local_addr()
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn allocate_conn_id(&self) -> u32 {
        let mut next = self.next_conn_id.lock();
        let id = *next;
        *next = next.wrapping_add(1).max(1);
        id
    }

    /// Mark `topic` as the target of an active lookup, fan out a
    /// `FIND_NODE` plus a handshake attempt and hole-punch probe to the
    /// closest known contacts (falling back to the configured bootstrap
    /// addresses if the routing table has nothing yet).
    pub fn join(&self, topic: [u8; 32]) -> Result<()> {
        self.dht.start_lookup(NodeId(topic));

        let closest = self.routing.find_closest(&NodeId(topic), JOIN_FANOUT);
        let targets: Vec<SocketAddrV4> = if closest.is_empty() {
            self.bootstrap.clone()
        } else {
            closest.iter().map(|c| c.addr).collect()
        };

        for addr in targets {
            let find_node = self.dht.send_find_node(&NodeId(topic))?;
            self.reactor.send_to(addr, &find_node)?;
            self.begin_handshake(addr)?;
        }
        Ok(())
    }

    pub fn leave(&self, _topic: [u8; 32]) {
        self.dht.clear_lookup();
    }

    /// Start (or restart) a handshake and hole-punch attempt toward `addr`.
    fn begin_handshake(&self, addr: SocketAddrV4) -> Result<()> {
        let conn_id = self.allocate_conn_id();
        let mut handshake = HandshakeState::new(Role::Initiator, self.static_kp.clone());
        let msg1 = handshake.start()?;

        let mut holepunch = Driver::new();
        holepunch.start(addr);

        {
            let mut udx = self.udx.lock();
            udx.send_data(self.reactor.socket(), addr, conn_id, &msg1, None)?;
        }

        self.peers.lock().insert(addr, PeerSession { conn_id, handshake, holepunch, session_key: None });
        Ok(())
    }

    /// Drain every queued datagram, dispatch it, and return the resulting
    /// application-visible events.
    pub fn drain_events(&self) -> Vec<NodeEvent> {
        let mut events = Vec::new();
        for inbound in self.reactor.drain() {
            if let Some(&first) = inbound.data.first() {
                if first < DHT_TYPE_CEILING {
                    self.dispatch_dht(&inbound.data, inbound.from, &mut events);
                } else if first >= UDX_TYPE_FLOOR {
                    self.dispatch_udx(&inbound.data, inbound.from, &mut events);
                }
            }
        }
        events
    }

    fn dispatch_dht(&self, buf: &[u8], from: SocketAddrV4, events: &mut Vec<NodeEvent>) {
        let outcome = match self.dht.handle_incoming(buf, from) {
            Ok(outcome) => outcome,
            Err(_) => return,
        };
        for (dest, frame) in outcome.replies {
            let _ = self.reactor.send_to(dest, &frame);
        }
        if let Some(DhtEvent::Peers { info_hash, peers }) = outcome.event {
            events.push(NodeEvent::TopicPeers { info_hash, peers });
        }
    }

    fn dispatch_udx(&self, buf: &[u8], from: SocketAddrV4, events: &mut Vec<NodeEvent>) {
        let mut peers = self.peers.lock();
        let session = peers.entry(from).or_insert_with(|| PeerSession {
            conn_id: 0,
            handshake: HandshakeState::new(Role::Responder, self.static_kp.clone()),
            holepunch: Driver::new(),
            session_key: None,
        });
        session.holepunch.on_packet_from(from);

        let socket = self.reactor.socket();
        let mut udx = self.udx.lock();
        let key = session.session_key.map(|(_, rx)| rx);
        let mut pending_acks: Vec<(u32, u32)> = Vec::new();
        let event = match udx.handle_incoming(buf, key.as_ref(), |conn_id, seq| pending_acks.push((conn_id, seq))) {
            Ok(event) => event,
            Err(_) => return,
        };
        for (conn_id, seq) in pending_acks {
            let _ = udx.send_ack(socket, from, conn_id, seq);
        }

        match event {
            UdxEvent::Holepunch { .. } => {}
            UdxEvent::Acked { .. } => {}
            UdxEvent::Payload { conn_id, data, .. } => {
                session.conn_id = conn_id;
                if session.handshake.is_established() {
                    events.push(NodeEvent::Data { peer: from, data });
                    return;
                }
                match session.handshake.handle_message(&data) {
                    Ok(Some(reply)) => {
                        let _ = udx.send_data(socket, from, conn_id, &reply, None);
                    }
                    Ok(None) => {}
                    Err(_) => return,
                }
                if session.handshake.is_established() {
                    if let (Some(tx), Some(rx)) = (session.handshake.tx_key(), session.handshake.rx_key()) {
                        session.session_key = Some((tx, rx));
                        events.push(NodeEvent::HandshakeEstablished { peer: from });
                    }
                }
            }
        }
    }

    /// Periodic maintenance: retransmit anything past its UDX backoff
    /// deadline, advance hole-punch probes, expire a topic lookup that's
    /// gone quiet, and drain whatever arrived since the last call.
    /// Intended to be called roughly every [`TICK_INTERVAL`].
    pub fn tick(&self) -> Vec<NodeEvent> {
        let events = self.drain_events();

        self.udx.lock().tick(self.reactor.socket());
        self.dht.expire_stale_lookup();

        let mut peers = self.peers.lock();
        for session in peers.values_mut() {
            if session.holepunch.state() == holepunch::State::Punching {
                session.holepunch.tick(self.reactor.socket(), session.conn_id);
            }
        }

        events
    }

    pub fn last_tick_due(&self, last: Instant) -> bool {
        last.elapsed() >= TICK_INTERVAL
    }
}

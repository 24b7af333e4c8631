//! DHT Protocol Engine.
//!
//! Builds and parses the 105-byte signed DHT header and its seven message
//! types, maintaining the routing table and topic peer store as a side
//! effect of dispatch. This reconciles what the reference source split
//! across two competing handlers into the single engine the spec calls
//! for: one verification path, one dispatch, exactly one outcome per
//! validated inbound packet.
//!
//! Every frame this engine emits is signed — there is no configuration in
//! which [`SigningIdentity`] is absent, so there is no path that falls
//! back to a dummy signature. Network-key encryption, in contrast, really
//! is optional: with no key configured, payloads ride in cleartext after
//! the (always-present) signature.

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use lib_crypto::{chacha20_decrypt, chacha20_encrypt, ed25519_verify, Ed25519Signature, SecureRng, SigningIdentity};

use crate::dht::header::{
    DhtHeader, DHT_TYPE_CEILING, HEADER_LEN, TYPE_ANNOUNCE_PEER, TYPE_FIND_NODE, TYPE_FOUND_NODES,
    TYPE_GET_PEERS, TYPE_PEERS, TYPE_PING, TYPE_PONG,
};
use crate::dht::messages::{
    decode_announce_peer, decode_find_node, decode_found_nodes, decode_get_peers, decode_peers,
    encode_announce_peer, encode_find_node, encode_found_nodes, encode_get_peers, encode_peers,
};
use crate::error::{NodeError, Result};
use crate::routing::{Contact, NodeId, RoutingTable, K};
use crate::topics::TopicPeerStore;

/// Packets older or newer than the local clock by more than this are
/// outside the replay window. Advisory per spec: logged, not enforced.
pub const REPLAY_WINDOW_MS: u64 = 60_000;

/// An active lookup with no fresh `FOUND_NODES` activity for this long is
/// considered stale and cleared on the next `expire_stale_lookup` call.
pub const LOOKUP_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum DhtEvent {
    Peers { info_hash: [u8; 32], peers: Vec<SocketAddrV4> },
}

/// Everything dispatch produced: frames to send, and at most one event for
/// the host application (never more than one, per spec's single-dispatch
/// requirement).
#[derive(Default)]
pub struct Outcome {
    pub replies: Vec<(SocketAddrV4, Vec<u8>)>,
    pub event: Option<DhtEvent>,
}

impl Outcome {
    fn empty() -> Self {
        Self::default()
    }
}

pub struct DhtEngine {
    identity: SigningIdentity,
    routing: Arc<RoutingTable>,
    topics: Arc<TopicPeerStore>,
    network_key: Option<[u8; 32]>,
    /// The lookup target plus the time of its last `FOUND_NODES` activity,
    /// so a stale lookup can be expired by [`Self::expire_stale_lookup`].
    active_lookup: Mutex<Option<(NodeId, Instant)>>,
}

impl DhtEngine {
    pub fn new(
        identity: SigningIdentity,
        routing: Arc<RoutingTable>,
        topics: Arc<TopicPeerStore>,
        network_key: Option<[u8; 32]>,
    ) -> Self {
        Self { identity, routing, topics, network_key, active_lookup: Mutex::new(None) }
    }

    fn local_id(&self) -> NodeId {
        self.routing.local_id()
    }

    /// Mark `target` as the key an active iterative lookup is converging
    /// on; newly learned contacts from `FOUND_NODES` get re-queried
    /// against it until the caller clears it or it goes stale.
    pub fn start_lookup(&self, target: NodeId) {
        *self.active_lookup.lock() = Some((target, Instant::now()));
    }

    pub fn clear_lookup(&self) {
        *self.active_lookup.lock() = None;
    }

    /// Clear the active lookup if it hasn't seen a `FOUND_NODES` reply in
    /// over [`LOOKUP_ACTIVITY_TIMEOUT`]. Called from the host's periodic
    /// tick; a no-op if there is no active lookup or it's still fresh.
    pub fn expire_stale_lookup(&self) {
        let mut lookup = self.active_lookup.lock();
        if let Some((_, last_activity)) = *lookup {
            if last_activity.elapsed() >= LOOKUP_ACTIVITY_TIMEOUT {
                *lookup = None;
            }
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    /// Sign and, if a network key is configured, encrypt `payload` into a
    /// complete outbound frame for `msg_type`.
    pub fn build_frame(&self, msg_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let mut header = DhtHeader {
            msg_type,
            sender_pk: self.identity.public_key(),
            timestamp_ms: Self::now_ms(),
            signature: [0u8; 64],
        };
        let signing_message = header.signing_message(payload);
        header.signature = self.identity.sign(&signing_message).0;

        let mut out = header.to_bytes().to_vec();
        match &self.network_key {
            Some(key) => {
                let nonce = SecureRng::generate_nonce12()?;
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&chacha20_encrypt(key, &nonce, 1, payload));
            }
            None => out.extend_from_slice(payload),
        }
        Ok(out)
    }

    /// Verify and (if configured) decrypt an inbound frame, returning the
    /// header and plaintext payload. Signature failures are reported as
    /// `BadSignature` so the caller can drop them silently without
    /// treating the packet as structurally malformed.
    fn verify_and_decode(&self, buf: &[u8]) -> Result<(DhtHeader, Vec<u8>)> {
        if buf.first().is_some_and(|&b| b >= DHT_TYPE_CEILING) {
            return Err(NodeError::BadType);
        }
        let header = DhtHeader::from_bytes(buf)?;
        let body = &buf[HEADER_LEN..];

        let payload = match &self.network_key {
            Some(key) => {
                if body.len() < 12 {
                    return Err(NodeError::TooShort);
                }
                let nonce: [u8; 12] = body[..12].try_into().unwrap();
                chacha20_decrypt(key, &nonce, 1, &body[12..])
            }
            None => body.to_vec(),
        };

        let signing_message = header.signing_message(&payload);
        if !ed25519_verify(&signing_message, &Ed25519Signature(header.signature), &header.sender_pk) {
            return Err(NodeError::BadSignature);
        }
        Ok((header, payload))
    }

    /// Handle one inbound datagram already known to belong to the DHT
    /// engine (first byte below [`DHT_TYPE_CEILING`]). A signature failure
    /// is swallowed into an empty outcome rather than returned as an
    /// error — the spec requires packets with invalid signatures to be
    /// dropped silently, not surfaced as a fault.
    pub fn handle_incoming(&self, buf: &[u8], from: SocketAddrV4) -> Result<Outcome> {
        let (header, payload) = match self.verify_and_decode(buf) {
            Ok(parsed) => parsed,
            Err(NodeError::BadSignature) => return Ok(Outcome::empty()),
            Err(e) => return Err(e),
        };

        let sender_id = NodeId(header.sender_pk);
        if sender_id != self.local_id() {
            self.routing.update(Contact { id: sender_id, addr: from, last_seen: std::time::Instant::now() });
        }

        self.dispatch(header.msg_type, &payload, from)
    }

    fn dispatch(&self, msg_type: u8, payload: &[u8], from: SocketAddrV4) -> Result<Outcome> {
        match msg_type {
            TYPE_PING => Ok(Outcome { replies: vec![(from, self.build_frame(TYPE_PONG, &[])?)], event: None }),

            TYPE_PONG => Ok(Outcome::empty()),

            TYPE_FIND_NODE => {
                let target = decode_find_node(payload)?;
                let closest = self.routing.find_closest(&target, K);
                let wire = closest.iter().map(|c| (c.id, c.addr)).collect::<Vec<_>>();
                let frame = self.build_frame(TYPE_FOUND_NODES, &encode_found_nodes(&wire))?;
                Ok(Outcome { replies: vec![(from, frame)], event: None })
            }

            TYPE_FOUND_NODES => {
                let contacts = decode_found_nodes(payload)?;
                let local = self.local_id();
                let mut replies = Vec::new();
                let lookup_target = {
                    let mut lookup = self.active_lookup.lock();
                    if let Some((target, last_activity)) = lookup.as_mut() {
                        *last_activity = Instant::now();
                        Some(*target)
                    } else {
                        None
                    }
                };
                for (id, addr) in contacts {
                    if id == local {
                        continue;
                    }
                    self.routing.update(Contact { id, addr, last_seen: std::time::Instant::now() });
                    if let Some(target) = lookup_target {
                        replies.push((addr, self.build_frame(TYPE_FIND_NODE, &encode_find_node(&target))?));
                    }
                }
                Ok(Outcome { replies, event: None })
            }

            TYPE_ANNOUNCE_PEER => {
                let (info_hash, port) = decode_announce_peer(payload)?;
                let addr = SocketAddrV4::new(*from.ip(), port);
                self.topics.announce(info_hash, addr);
                Ok(Outcome::empty())
            }

            TYPE_GET_PEERS => {
                let info_hash = decode_get_peers(payload)?;
                if self.topics.has_peers(&info_hash) {
                    let peers: Vec<SocketAddrV4> =
                        self.topics.get_peers(&info_hash, 32).into_iter().map(|p| p.addr).collect();
                    let frame = self.build_frame(TYPE_PEERS, &encode_peers(&info_hash, &peers))?;
                    Ok(Outcome { replies: vec![(from, frame)], event: None })
                } else {
                    let closest = self.routing.find_closest(&NodeId(info_hash), K);
                    let wire = closest.iter().map(|c| (c.id, c.addr)).collect::<Vec<_>>();
                    let frame = self.build_frame(TYPE_FOUND_NODES, &encode_found_nodes(&wire))?;
                    Ok(Outcome { replies: vec![(from, frame)], event: None })
                }
            }

            TYPE_PEERS => {
                let (info_hash, peers) = decode_peers(payload)?;
                Ok(Outcome { replies: vec![], event: Some(DhtEvent::Peers { info_hash, peers }) })
            }

            _ => Err(NodeError::BadType),
        }
    }

    pub fn send_ping(&self) -> Result<Vec<u8>> {
        self.build_frame(TYPE_PING, &[])
    }

    pub fn send_find_node(&self, target: &NodeId) -> Result<Vec<u8>> {
        self.build_frame(TYPE_FIND_NODE, &encode_find_node(target))
    }

    pub fn send_announce_peer(&self, info_hash: &[u8; 32], port: u16) -> Result<Vec<u8>> {
        self.build_frame(TYPE_ANNOUNCE_PEER, &encode_announce_peer(info_hash, port))
    }

    pub fn send_get_peers(&self, info_hash: &[u8; 32]) -> Result<Vec<u8>> {
        self.build_frame(TYPE_GET_PEERS, &encode_get_peers(info_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
    }

    fn engine(network_key: Option<[u8; 32]>) -> (DhtEngine, NodeId) {
        let identity = SigningIdentity::generate().unwrap();
        let local_id = NodeId(identity.public_key());
        let routing = Arc::new(RoutingTable::new(local_id));
        let topics = Arc::new(TopicPeerStore::new());
        (DhtEngine::new(identity, routing, topics, network_key), local_id)
    }

    #[test]
    fn ping_round_trips_to_a_pong() {
        let (engine, _) = engine(None);
        let frame = engine.send_ping().unwrap();
        let outcome = engine.handle_incoming(&frame, addr(1)).unwrap();
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].1[0], TYPE_PONG);
    }

    #[test]
    fn tampered_signature_is_dropped_silently() {
        let (engine, _) = engine(None);
        let mut frame = engine.send_ping().unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        let outcome = engine.handle_incoming(&frame, addr(1)).unwrap();
        assert!(outcome.replies.is_empty());
        assert!(outcome.event.is_none());
    }

    #[test]
    fn network_key_mode_round_trips() {
        let key = [0x42u8; 32];
        let (engine, _) = engine(Some(key));
        let frame = engine.send_ping().unwrap();
        let outcome = engine.handle_incoming(&frame, addr(1)).unwrap();
        assert_eq!(outcome.replies.len(), 1);
    }

    #[test]
    fn find_node_replies_with_found_nodes() {
        let (engine, local_id) = engine(None);
        let contact_id = NodeId([9u8; 32]);
        engine.routing.update(Contact { id: contact_id, addr: addr(2), last_seen: std::time::Instant::now() });

        let finder_identity = SigningIdentity::generate().unwrap();
        let finder_routing = Arc::new(RoutingTable::new(NodeId(finder_identity.public_key())));
        let finder = DhtEngine::new(finder_identity, finder_routing, Arc::new(TopicPeerStore::new()), None);
        let frame = finder.send_find_node(&local_id).unwrap();

        let outcome = engine.handle_incoming(&frame, addr(3)).unwrap();
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].1[0], TYPE_FOUND_NODES);
    }

    #[test]
    fn announce_then_get_peers_returns_peers() {
        let (engine, _) = engine(None);
        let info_hash = [5u8; 32];
        let announcer = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 4000);
        let frame = engine.build_frame(TYPE_ANNOUNCE_PEER, &encode_announce_peer(&info_hash, 4000)).unwrap();
        engine.handle_incoming(&frame, announcer).unwrap();

        let get_peers_frame = engine.build_frame(TYPE_GET_PEERS, &encode_get_peers(&info_hash)).unwrap();
        let outcome = engine.handle_incoming(&get_peers_frame, addr(9)).unwrap();
        assert_eq!(outcome.replies[0].1[0], TYPE_PEERS);
    }

    #[test]
    fn get_peers_with_no_peers_falls_back_to_found_nodes() {
        let (engine, _) = engine(None);
        let info_hash = [1u8; 32];
        let frame = engine.build_frame(TYPE_GET_PEERS, &encode_get_peers(&info_hash)).unwrap();
        let outcome = engine.handle_incoming(&frame, addr(9)).unwrap();
        assert_eq!(outcome.replies[0].1[0], TYPE_FOUND_NODES);
    }

    #[test]
    fn peers_message_emits_exactly_one_event() {
        let (engine, _) = engine(None);
        let info_hash = [2u8; 32];
        let peers = vec![addr(10), addr(11)];
        let frame = engine.build_frame(TYPE_PEERS, &encode_peers(&info_hash, &peers)).unwrap();
        let outcome = engine.handle_incoming(&frame, addr(20)).unwrap();
        assert!(outcome.replies.is_empty());
        match outcome.event {
            Some(DhtEvent::Peers { info_hash: got_hash, peers: got_peers }) => {
                assert_eq!(got_hash, info_hash);
                assert_eq!(got_peers, peers);
            }
            None => panic!("expected exactly one Peers event"),
        }
    }

    #[test]
    fn udx_range_first_byte_is_rejected() {
        let (engine, _) = engine(None);
        assert!(matches!(engine.handle_incoming(&[0x80], addr(1)), Err(NodeError::BadType)));
    }

    #[test]
    fn fresh_lookup_survives_expiry_check() {
        let (engine, _) = engine(None);
        engine.start_lookup(NodeId([7u8; 32]));
        engine.expire_stale_lookup();
        assert!(engine.active_lookup.lock().is_some());
    }

    #[test]
    fn stale_lookup_is_cleared_on_expiry_check() {
        let (engine, _) = engine(None);
        engine.start_lookup(NodeId([7u8; 32]));
        {
            let mut lookup = engine.active_lookup.lock();
            let (_, last_activity) = lookup.as_mut().unwrap();
            *last_activity = Instant::now() - LOOKUP_ACTIVITY_TIMEOUT - Duration::from_millis(1);
        }
        engine.expire_stale_lookup();
        assert!(engine.active_lookup.lock().is_none());
    }

    #[test]
    fn found_nodes_refreshes_lookup_activity() {
        let (engine, local_id) = engine(None);
        engine.start_lookup(NodeId([7u8; 32]));
        {
            let mut lookup = engine.active_lookup.lock();
            let (_, last_activity) = lookup.as_mut().unwrap();
            *last_activity = Instant::now() - LOOKUP_ACTIVITY_TIMEOUT - Duration::from_millis(1);
        }

        let finder_identity = SigningIdentity::generate().unwrap();
        let finder_routing = Arc::new(RoutingTable::new(NodeId(finder_identity.public_key())));
        let finder = DhtEngine::new(finder_identity, finder_routing, Arc::new(TopicPeerStore::new()), None);
        let frame = finder.send_find_node(&local_id).unwrap();
        engine.handle_incoming(&frame, addr(4)).unwrap();

        engine.expire_stale_lookup();
        assert!(engine.active_lookup.lock().is_some());
    }
}

//! Bounded per-topic peer store for the announce/get-peers flow.
//!
//! Each topic (a 32-byte hash) maps to a list of up to
//! [`MAX_PEERS_PER_TOPIC`] peers. Announcing a peer already in the list
//! just refreshes its timestamp; announcing past the cap is dropped. A
//! single mutex guards the whole map, mirroring the routing table's
//! discipline.

use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub const MAX_PEERS_PER_TOPIC: usize = 32;

#[derive(Clone, Copy)]
pub struct PeerInfo {
    pub addr: SocketAddrV4,
    pub last_seen: Instant,
}

pub struct TopicPeerStore {
    topics: Mutex<HashMap<[u8; 32], Vec<PeerInfo>>>,
}

impl TopicPeerStore {
    pub fn new() -> Self {
        Self { topics: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if the peer was stored (new or refreshed), `false`
    /// if the topic's list was already at capacity and this is a new peer.
    pub fn announce(&self, topic: [u8; 32], addr: SocketAddrV4) -> bool {
        let mut topics = self.topics.lock();
        let peers = topics.entry(topic).or_default();

        if let Some(existing) = peers.iter_mut().find(|p| p.addr == addr) {
            existing.last_seen = Instant::now();
            return true;
        }
        if peers.len() >= MAX_PEERS_PER_TOPIC {
            return false;
        }
        peers.push(PeerInfo { addr, last_seen: Instant::now() });
        true
    }

    pub fn get_peers(&self, topic: &[u8; 32], max: usize) -> Vec<PeerInfo> {
        let topics = self.topics.lock();
        topics.get(topic).map(|peers| peers.iter().take(max).cloned().collect()).unwrap_or_default()
    }

    pub fn has_peers(&self, topic: &[u8; 32]) -> bool {
        self.topics.lock().get(topic).is_some_and(|p| !p.is_empty())
    }

    /// Drop peers stale past `ttl`, then drop any topic left empty.
    pub fn cleanup(&self, ttl: Duration) {
        let now = Instant::now();
        let mut topics = self.topics.lock();
        topics.retain(|_, peers| {
            peers.retain(|p| now.duration_since(p.last_seen) < ttl);
            !peers.is_empty()
        });
    }
}

impl Default for TopicPeerStore {
    fn default() -> Self {
        Self::new()
    }
}

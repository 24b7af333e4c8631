//! XOR-distance routing table.
//!
//! 256 k-buckets, one per possible count of leading bits shared with the
//! local id, each holding up to [`K`] contacts. A contact's bucket is
//! `leading_common_bits(local, contact)`: a remote id that differs in the
//! most significant bit lands in bucket 0, one that differs only in the
//! least significant bit lands in bucket 255, and the local id itself
//! would (degenerately) land past bucket 255 — clamped there, since that
//! slot is otherwise unreachable.
//!
//! The whole table sits behind one [`parking_lot::Mutex`]: updates arrive
//! far more often than full-table scans, so a single mutex beats a
//! reader/writer split in practice.

use std::net::SocketAddrV4;
use std::time::Instant;

use parking_lot::Mutex;

pub const NODE_ID_LEN: usize = 32;
pub const K: usize = 20;
pub const NUM_BUCKETS: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    pub fn distance(&self, other: &NodeId) -> [u8; NODE_ID_LEN] {
        let mut out = [0u8; NODE_ID_LEN];
        for i in 0..NODE_ID_LEN {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }

    /// Number of leading bits `self` and `other` share, from the MSB of
    /// byte 0. Returns 256 for identical ids.
    pub fn leading_common_bits(&self, other: &NodeId) -> u32 {
        let mut bits = 0u32;
        for i in 0..NODE_ID_LEN {
            let x = self.0[i] ^ other.0[i];
            if x == 0 {
                bits += 8;
                continue;
            }
            bits += x.leading_zeros();
            return bits;
        }
        bits
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

#[derive(Clone)]
pub struct Contact {
    pub id: NodeId,
    pub addr: SocketAddrV4,
    pub last_seen: Instant,
}

struct KBucket {
    contacts: Vec<Contact>,
}

impl KBucket {
    fn new() -> Self {
        Self { contacts: Vec::with_capacity(K) }
    }

    /// Update an existing contact (moving it to the tail, i.e. most
    /// recently seen) or insert a new one if the bucket has room. Returns
    /// `false` if the bucket was full and the insert was dropped.
    fn upsert(&mut self, contact: Contact) -> bool {
        if let Some(pos) = self.contacts.iter().position(|c| c.id == contact.id) {
            self.contacts.remove(pos);
            self.contacts.push(contact);
            return true;
        }
        if self.contacts.len() >= K {
            return false;
        }
        self.contacts.push(contact);
        true
    }
}

pub struct RoutingTable {
    local_id: NodeId,
    buckets: Mutex<Vec<KBucket>>,
}

impl RoutingTable {
    pub fn new(local_id: NodeId) -> Self {
        let buckets = (0..NUM_BUCKETS).map(|_| KBucket::new()).collect();
        Self { local_id, buckets: Mutex::new(buckets) }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    fn bucket_index(&self, id: &NodeId) -> usize {
        let common = self.local_id.leading_common_bits(id);
        (common as usize).min(NUM_BUCKETS - 1)
    }

    /// Insert or refresh a contact. Returns `false` (dropping the new
    /// contact) if it is new and its bucket is already at capacity — this
    /// table never evicts an existing entry to make room.
    pub fn update(&self, contact: Contact) -> bool {
        let index = self.bucket_index(&contact.id);
        let mut buckets = self.buckets.lock();
        buckets[index].upsert(contact)
    }

    pub fn remove(&self, id: &NodeId) {
        let index = self.bucket_index(id);
        let mut buckets = self.buckets.lock();
        buckets[index].contacts.retain(|c| c.id != *id);
    }

    /// The `count` contacts closest to `target` by XOR distance, across
    /// the whole table.
    pub fn find_closest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        let buckets = self.buckets.lock();
        let mut all: Vec<Contact> = buckets.iter().flat_map(|b| b.contacts.iter().cloned()).collect();
        all.sort_by(|a, b| a.id.distance(target).cmp(&b.id.distance(target)));
        all.truncate(count);
        all
    }

    pub fn bucket_len(&self, index: usize) -> usize {
        self.buckets.lock()[index].contacts.len()
    }

    pub fn total_contacts(&self) -> usize {
        self.buckets.lock().iter().map(|b| b.contacts.len()).sum()
    }
}

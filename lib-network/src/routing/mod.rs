//! XOR-distance routing table used to locate contacts for a DHT lookup.

pub mod kbucket;

pub use kbucket::{Contact, NodeId, RoutingTable, K, NODE_ID_LEN, NUM_BUCKETS};

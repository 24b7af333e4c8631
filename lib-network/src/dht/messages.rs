//! Packed payload encodings for each DHT message type. IPv4 addresses and
//! ports are stored here in host order and converted to/from network
//! (big-endian) order only at `to_bytes`/`from_bytes` — the single
//! conversion boundary the wire format gets.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{NodeError, Result};
use crate::routing::{NodeId, NODE_ID_LEN};

pub const NODE_WIRE_LEN: usize = 38;
pub const PEER_WIRE_LEN: usize = 6;

pub fn encode_node(id: &NodeId, addr: SocketAddrV4) -> [u8; NODE_WIRE_LEN] {
    let mut out = [0u8; NODE_WIRE_LEN];
    out[..NODE_ID_LEN].copy_from_slice(&id.0);
    out[NODE_ID_LEN..NODE_ID_LEN + 4].copy_from_slice(&u32::from(*addr.ip()).to_be_bytes());
    out[NODE_ID_LEN + 4..NODE_ID_LEN + 6].copy_from_slice(&addr.port().to_be_bytes());
    out
}

pub fn decode_node(buf: &[u8]) -> Result<(NodeId, SocketAddrV4)> {
    if buf.len() < NODE_WIRE_LEN {
        return Err(NodeError::TooShort);
    }
    let mut id = [0u8; NODE_ID_LEN];
    id.copy_from_slice(&buf[..NODE_ID_LEN]);
    let ip = Ipv4Addr::from(u32::from_be_bytes(buf[NODE_ID_LEN..NODE_ID_LEN + 4].try_into().unwrap()));
    let port = u16::from_be_bytes(buf[NODE_ID_LEN + 4..NODE_ID_LEN + 6].try_into().unwrap());
    Ok((NodeId(id), SocketAddrV4::new(ip, port)))
}

pub fn encode_peer(addr: SocketAddrV4) -> [u8; PEER_WIRE_LEN] {
    let mut out = [0u8; PEER_WIRE_LEN];
    out[..4].copy_from_slice(&u32::from(*addr.ip()).to_be_bytes());
    out[4..6].copy_from_slice(&addr.port().to_be_bytes());
    out
}

pub fn decode_peer(buf: &[u8]) -> Result<SocketAddrV4> {
    if buf.len() < PEER_WIRE_LEN {
        return Err(NodeError::TooShort);
    }
    let ip = Ipv4Addr::from(u32::from_be_bytes(buf[..4].try_into().unwrap()));
    let port = u16::from_be_bytes(buf[4..6].try_into().unwrap());
    Ok(SocketAddrV4::new(ip, port))
}

pub fn encode_find_node(target: &NodeId) -> Vec<u8> {
    target.0.to_vec()
}

pub fn decode_find_node(buf: &[u8]) -> Result<NodeId> {
    if buf.len() < NODE_ID_LEN {
        return Err(NodeError::TooShort);
    }
    let mut id = [0u8; NODE_ID_LEN];
    id.copy_from_slice(&buf[..NODE_ID_LEN]);
    Ok(NodeId(id))
}

pub fn encode_found_nodes(contacts: &[(NodeId, SocketAddrV4)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + contacts.len() * NODE_WIRE_LEN);
    out.push(contacts.len() as u8);
    for (id, addr) in contacts {
        out.extend_from_slice(&encode_node(id, *addr));
    }
    out
}

pub fn decode_found_nodes(buf: &[u8]) -> Result<Vec<(NodeId, SocketAddrV4)>> {
    if buf.is_empty() {
        return Err(NodeError::TooShort);
    }
    let count = buf[0] as usize;
    let mut out = Vec::with_capacity(count);
    let mut offset = 1;
    for _ in 0..count {
        let (id, addr) = decode_node(&buf[offset..])?;
        out.push((id, addr));
        offset += NODE_WIRE_LEN;
    }
    Ok(out)
}

pub fn encode_announce_peer(info_hash: &[u8; 32], port: u16) -> [u8; 34] {
    let mut out = [0u8; 34];
    out[..32].copy_from_slice(info_hash);
    out[32..34].copy_from_slice(&port.to_be_bytes());
    out
}

pub fn decode_announce_peer(buf: &[u8]) -> Result<([u8; 32], u16)> {
    if buf.len() < 34 {
        return Err(NodeError::TooShort);
    }
    let mut info_hash = [0u8; 32];
    info_hash.copy_from_slice(&buf[..32]);
    let port = u16::from_be_bytes(buf[32..34].try_into().unwrap());
    Ok((info_hash, port))
}

pub fn encode_get_peers(info_hash: &[u8; 32]) -> [u8; 32] {
    *info_hash
}

pub fn decode_get_peers(buf: &[u8]) -> Result<[u8; 32]> {
    if buf.len() < 32 {
        return Err(NodeError::TooShort);
    }
    let mut info_hash = [0u8; 32];
    info_hash.copy_from_slice(&buf[..32]);
    Ok(info_hash)
}

pub fn encode_peers(info_hash: &[u8; 32], peers: &[SocketAddrV4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(33 + peers.len() * PEER_WIRE_LEN);
    out.extend_from_slice(info_hash);
    out.push(peers.len() as u8);
    for peer in peers {
        out.extend_from_slice(&encode_peer(*peer));
    }
    out
}

pub fn decode_peers(buf: &[u8]) -> Result<([u8; 32], Vec<SocketAddrV4>)> {
    if buf.len() < 33 {
        return Err(NodeError::TooShort);
    }
    let mut info_hash = [0u8; 32];
    info_hash.copy_from_slice(&buf[..32]);
    let count = buf[32] as usize;
    let mut out = Vec::with_capacity(count);
    let mut offset = 33;
    for _ in 0..count {
        out.push(decode_peer(&buf[offset..])?);
        offset += PEER_WIRE_LEN;
    }
    Ok((info_hash, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 42), port)
    }

    #[test]
    fn node_wire_round_trips() {
        let id = NodeId([3u8; 32]);
        let bytes = encode_node(&id, addr(9000));
        let (parsed_id, parsed_addr) = decode_node(&bytes).unwrap();
        assert_eq!(parsed_id.0, id.0);
        assert_eq!(parsed_addr, addr(9000));
    }

    #[test]
    fn found_nodes_round_trips_with_count_prefix() {
        let contacts = vec![(NodeId([1u8; 32]), addr(1)), (NodeId([2u8; 32]), addr(2))];
        let bytes = encode_found_nodes(&contacts);
        assert_eq!(bytes[0], 2);
        let decoded = decode_found_nodes(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].1, addr(1));
    }

    #[test]
    fn peers_round_trips_with_info_hash_and_count() {
        let info_hash = [5u8; 32];
        let peers = vec![addr(10), addr(20), addr(30)];
        let bytes = encode_peers(&info_hash, &peers);
        let (decoded_hash, decoded_peers) = decode_peers(&bytes).unwrap();
        assert_eq!(decoded_hash, info_hash);
        assert_eq!(decoded_peers, peers);
    }

    #[test]
    fn empty_found_nodes_has_zero_count() {
        let bytes = encode_found_nodes(&[]);
        assert_eq!(bytes, vec![0u8]);
        assert!(decode_found_nodes(&bytes).unwrap().is_empty());
    }
}

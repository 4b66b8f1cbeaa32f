use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use udplink_socket::SocketId;

/// A session is identified by the host socket it owns.
pub type SessionId = SocketId;

/// Where a session's datagrams are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: IpAddr,
    pub port: u16,
}

impl PeerInfo {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// Maps open sessions to their peers.
#[derive(Debug, Default)]
pub struct SocketRegistry {
    peers: HashMap<SessionId, PeerInfo>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the peer for a session, replacing any previous entry.
    pub fn register(&mut self, id: SessionId, peer: PeerInfo) -> Option<PeerInfo> {
        self.peers.insert(id, peer)
    }

    pub fn lookup(&self, id: SessionId) -> Option<&PeerInfo> {
        self.peers.get(&id)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<PeerInfo> {
        self.peers.remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

//! Peer identities and the fixed peer directory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Opaque identifier of a node in the mesh
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A video feed that can be put on screen.
///
/// The local camera is its own case so it can never collide with a real
/// peer id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedId {
    Remote(PeerId),
    LocalCamera,
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedId::Remote(id) => write!(f, "{}", id),
            FeedId::LocalCamera => f.write_str("local"),
        }
    }
}

/// Directory entry for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    /// IP address the node sends from and listens on
    pub address: IpAddr,
    /// Human readable name shown in the UI
    pub name: String,
}

/// The fixed set of nodes for a session, in configuration order
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    peers: Vec<PeerInfo>,
}

impl PeerDirectory {
    pub fn new(peers: Vec<PeerInfo>) -> Self {
        Self { peers }
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.peers.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.get(id).is_some()
    }

    /// All peers except `me`, order preserved
    pub fn others(&self, me: &PeerId) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|p| &p.id != me)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Resolve the sender of a datagram to a known remote peer
    pub fn resolve(&self, me: &PeerId, source: IpAddr) -> Option<&PeerId> {
        self.peers
            .iter()
            .find(|p| &p.id != me && p.address == source)
            .map(|p| &p.id)
    }

    /// Send targets for every peer except `me`
    pub fn targets(&self, me: &PeerId, port: u16) -> Vec<SocketAddr> {
        self.peers
            .iter()
            .filter(|p| &p.id != me)
            .map(|p| SocketAddr::new(p.address, port))
            .collect()
    }

    pub fn name_of(&self, id: &PeerId) -> Option<&str> {
        self.get(id).map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

// crates/warden-core/src/peer.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::FeedId;

/// Network address of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub key: FeedId,
    pub host: String,
    pub port: u16,
}

/// Transport state of a connection-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    Connected,
    Connecting,
    Disconnected,
}

/// How a peer got into the connection table.
///
/// `Friends` marks a preferred peer and is what startup reconciliation
/// promotes followed peers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerSource {
    /// Discovered from a `pub` announcement.
    Pub,
    /// Followed by the local identity.
    Friends,
    /// Added by the user.
    Manual,
    /// Found on the local network.
    Local,
    /// Loaded from the persisted peer list.
    Stored,
}

impl fmt::Display for PeerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerSource::Pub => write!(f, "pub"),
            PeerSource::Friends => write!(f, "friends"),
            PeerSource::Manual => write!(f, "manual"),
            PeerSource::Local => write!(f, "local"),
            PeerSource::Stored => write!(f, "stored"),
        }
    }
}

/// A connection-table entry. Owned by the connection layer; the policy
/// layer only reads records and requests transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: PeerAddress,
    pub state: PeerState,
    pub source: PeerSource,
}

impl PeerRecord {
    pub fn key(&self) -> &FeedId {
        &self.address.key
    }

    pub fn host(&self) -> &str {
        &self.address.host
    }

    pub fn is_connected(&self) -> bool {
        self.state == PeerState::Connected
    }
}

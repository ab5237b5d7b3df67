// crates/warden-p2p/src/table.rs
//
// MemoryConnectionTable: an in-memory peer table that records every command
// the policy layer issues against it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use warden_core::{
    ConnectionTable, FeedId, PeerAddress, PeerRecord, PeerSource, PeerState, WardenError,
};

/// A command received by the table, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TableCommand {
    Add { key: FeedId, source: PeerSource },
    Remove { key: FeedId, source: Option<PeerSource> },
    Disconnect { key: FeedId },
}

/// Connection table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionTable {
    /// Peers by identity.
    peers: Arc<RwLock<BTreeMap<FeedId, PeerRecord>>>,
    /// Every command issued, for inspection by tests and dry runs.
    commands: Arc<RwLock<Vec<TableCommand>>>,
    /// Peers whose disconnect reports failure.
    failing_disconnects: Arc<RwLock<HashSet<FeedId>>>,
}

impl MemoryConnectionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a peer without recording a command.
    pub async fn insert(&self, record: PeerRecord) {
        self.peers.write().await.insert(record.key().clone(), record);
    }

    /// Change a peer's transport state. Returns `false` if the peer is unknown.
    pub async fn set_state(&self, key: &FeedId, state: PeerState) -> bool {
        match self.peers.write().await.get_mut(key) {
            Some(peer) => {
                peer.state = state;
                true
            }
            None => false,
        }
    }

    /// Make every later disconnect of `key` fail.
    pub async fn fail_disconnects_for(&self, key: FeedId) {
        self.failing_disconnects.write().await.insert(key);
    }

    /// All commands received so far.
    pub async fn commands(&self) -> Vec<TableCommand> {
        self.commands.read().await.clone()
    }

    async fn record(&self, command: TableCommand) {
        self.commands.write().await.push(command);
    }
}

#[async_trait]
impl ConnectionTable for MemoryConnectionTable {
    async fn list(&self) -> Vec<PeerRecord> {
        self.peers.read().await.values().cloned().collect()
    }

    async fn get(&self, key: &FeedId) -> Option<PeerRecord> {
        self.peers.read().await.get(key).cloned()
    }

    async fn add(&self, address: &PeerAddress, source: PeerSource) -> Result<(), WardenError> {
        self.record(TableCommand::Add {
            key: address.key.clone(),
            source,
        })
        .await;

        let mut peers = self.peers.write().await;
        match peers.get_mut(&address.key) {
            Some(peer) => {
                peer.address = address.clone();
                peer.source = source;
            }
            None => {
                peers.insert(
                    address.key.clone(),
                    PeerRecord {
                        address: address.clone(),
                        state: PeerState::Disconnected,
                        source,
                    },
                );
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &FeedId, source: Option<PeerSource>) -> Result<(), WardenError> {
        self.record(TableCommand::Remove {
            key: key.clone(),
            source,
        })
        .await;

        let mut peers = self.peers.write().await;
        let matches = match (peers.get(key), source) {
            (Some(peer), Some(source)) => peer.source == source,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            peers.remove(key);
        }
        Ok(())
    }

    async fn disconnect(&self, key: &FeedId) -> Result<(), WardenError> {
        self.record(TableCommand::Disconnect { key: key.clone() }).await;

        if self.failing_disconnects.read().await.contains(key) {
            return Err(WardenError::Network(format!("disconnect from {} failed", key)));
        }

        let mut peers = self.peers.write().await;
        let peer = peers
            .get_mut(key)
            .ok_or_else(|| WardenError::NotFound(format!("peer {}", key)))?;
        peer.state = PeerState::Disconnected;
        Ok(())
    }
}

// crates/warden-sync/src/transport.rs
//
// RecordingTransport: an in-memory replication transport and EBT layer
// that records every command it receives.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use warden_core::{EbtControl, FeedId, ReplicationTransport, WardenError};

/// A `request(feed, replicate)` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationRequest {
    pub feed: FeedId,
    pub replicate: bool,
}

/// A `block(from, to, blocking)` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbtBlock {
    pub from: FeedId,
    pub to: FeedId,
    pub blocking: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    requests: Arc<RwLock<Vec<ReplicationRequest>>>,
    blocks: Arc<RwLock<Vec<EbtBlock>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requests(&self) -> Vec<ReplicationRequest> {
        self.requests.read().await.clone()
    }

    /// Replication requests issued for a single feed, oldest first.
    pub async fn requests_for(&self, feed: &FeedId) -> Vec<bool> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| &r.feed == feed)
            .map(|r| r.replicate)
            .collect()
    }

    pub async fn blocks(&self) -> Vec<EbtBlock> {
        self.blocks.read().await.clone()
    }
}

#[async_trait]
impl ReplicationTransport for RecordingTransport {
    async fn request(&self, feed: &FeedId, replicate: bool) -> Result<(), WardenError> {
        self.requests.write().await.push(ReplicationRequest {
            feed: feed.clone(),
            replicate,
        });
        Ok(())
    }
}

#[async_trait]
impl EbtControl for RecordingTransport {
    async fn block(&self, from: &FeedId, to: &FeedId, blocking: bool) -> Result<(), WardenError> {
        self.blocks.write().await.push(EbtBlock {
            from: from.clone(),
            to: to.clone(),
            blocking,
        });
        Ok(())
    }
}

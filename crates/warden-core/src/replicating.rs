// crates/warden-core/src/replicating.rs
//
// The set of feeds the local node actively replicates.
//
// `ReplicatingSet` is the single writer and is not `Clone`: whoever owns it
// (the replication tracker) is the only component that can change the set.
// Everyone else gets a `ReplicatingView`.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::identity::FeedId;

/// Writer handle over the replicating set.
#[derive(Debug, Default)]
pub struct ReplicatingSet {
    inner: Arc<RwLock<HashSet<FeedId>>>,
}

/// Read-only, cloneable view of the replicating set.
#[derive(Debug, Clone)]
pub struct ReplicatingView {
    inner: Arc<RwLock<HashSet<FeedId>>>,
}

impl ReplicatingSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only view sharing this set's contents.
    pub fn view(&self) -> ReplicatingView {
        ReplicatingView {
            inner: self.inner.clone(),
        }
    }

    /// Returns `true` if the feed was not already present.
    pub async fn insert(&mut self, feed: FeedId) -> bool {
        self.inner.write().await.insert(feed)
    }

    /// Returns `true` if the feed was present.
    pub async fn remove(&mut self, feed: &FeedId) -> bool {
        self.inner.write().await.remove(feed)
    }
}

impl ReplicatingView {
    pub async fn contains(&self, feed: &FeedId) -> bool {
        self.inner.read().await.contains(feed)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Sorted copy of the current members.
    pub async fn members(&self) -> Vec<FeedId> {
        let mut members: Vec<FeedId> = self.inner.read().await.iter().cloned().collect();
        members.sort();
        members
    }
}

// crates/warden-trust/src/memory.rs
//
// In-memory trust graph source with a live change stream.
//
// Every applied delta is published, in application order, to each live
// subscriber. Publishing waits for subscriber capacity, so a slow consumer
// slows down `apply` rather than queueing deltas without bound.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use warden_core::{
    FeedId, GraphDelta, Publisher, Relation, Subscription, TrustGraph, TrustGraphSource,
    WardenError,
};

/// Default number of undelivered deltas a subscriber may hold.
pub const DEFAULT_BUFFER: usize = 64;

/// A trust graph held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTrustGraph {
    graph: Arc<RwLock<Arc<TrustGraph>>>,
    /// Live subscribers. Also serializes `apply` so deltas are delivered in
    /// the order they were applied.
    subscribers: Arc<Mutex<Vec<Publisher<GraphDelta>>>>,
    buffer: usize,
}

impl MemoryTrustGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::with_graph(TrustGraph::new())
    }

    /// Create a source seeded with an existing graph.
    pub fn with_graph(graph: TrustGraph) -> Self {
        Self {
            graph: Arc::new(RwLock::new(Arc::new(graph))),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Set the per-subscriber buffer size for subscriptions created later.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Apply a delta and publish it to every live subscriber.
    pub async fn apply(&self, delta: GraphDelta) {
        if delta.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.lock().await;
        {
            let mut graph = self.graph.write().await;
            Arc::make_mut(&mut *graph).apply(&delta);
        }

        let mut live = Vec::with_capacity(subscribers.len());
        for tx in subscribers.drain(..) {
            if tx.send(delta.clone()).await.is_ok() {
                live.push(tx);
            } else {
                tracing::trace!("Dropping closed graph subscriber");
            }
        }
        *subscribers = live;
    }

    /// Convenience for a single-edge delta.
    pub async fn set(&self, source: FeedId, dest: FeedId, relation: Relation) {
        self.apply(GraphDelta::new().with(source, dest, relation)).await;
    }

    /// Number of subscribers still attached.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .await
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

impl Default for MemoryTrustGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrustGraphSource for MemoryTrustGraph {
    async fn snapshot(&self) -> Result<Arc<TrustGraph>, WardenError> {
        Ok(self.graph.read().await.clone())
    }

    async fn changes(&self) -> Subscription<GraphDelta> {
        let (tx, sub) = Subscription::channel(self.buffer);
        self.subscribers.lock().await.push(tx);
        sub
    }

    async fn is_blocking(&self, source: &FeedId, dest: &FeedId) -> Result<bool, WardenError> {
        Ok(self.graph.read().await.is_blocking(source, dest))
    }
}

// crates/warden-trust/src/intent.rs
//
// Replication intent derivation: which feeds the local identity should
// replicate, given the trust graph.
//
// A feed is replicated when it is reachable from the local identity over
// follow edges within `hops` steps. Feeds the local identity blocks are
// never replicated and are not traversed. Everything else is unknown.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use warden_core::{
    FeedId, GraphDelta, IntentBatch, Publisher, Relation, ReplicationIntent, Subscription,
    TrustGraph, TrustGraphSource,
};

/// Default follow distance replicated: friends and friends of friends.
pub const DEFAULT_HOPS: u32 = 2;

/// Compute every non-`Unknown` intent relative to `local`.
pub fn replication_intents(
    graph: &TrustGraph,
    local: &FeedId,
    hops: u32,
) -> BTreeMap<FeedId, ReplicationIntent> {
    let mut intents = BTreeMap::new();
    intents.insert(local.clone(), ReplicationIntent::Replicate);

    let mut seen: HashSet<FeedId> = HashSet::from([local.clone()]);
    let mut frontier = vec![local.clone()];

    for _ in 0..hops {
        let mut next = Vec::new();
        for node in &frontier {
            for (dest, relation) in graph.outgoing(node) {
                if relation != Relation::Follows || graph.is_blocking(local, dest) {
                    continue;
                }
                if seen.insert(dest.clone()) {
                    intents.insert(dest.clone(), ReplicationIntent::Replicate);
                    next.push(dest.clone());
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    for (dest, relation) in graph.outgoing(local) {
        if relation == Relation::Blocks && dest != local {
            intents.insert(dest.clone(), ReplicationIntent::Unreplicate);
        }
    }

    intents
}

/// Intents that differ between two full intent maps. Feeds that dropped out
/// of `current` are reported as `Unknown`.
pub fn diff_intents(
    previous: &BTreeMap<FeedId, ReplicationIntent>,
    current: &BTreeMap<FeedId, ReplicationIntent>,
) -> IntentBatch {
    let mut batch = IntentBatch::new();
    for (feed, intent) in current {
        if previous.get(feed) != Some(intent) {
            batch.insert(feed.clone(), *intent);
        }
    }
    for feed in previous.keys() {
        if !current.contains_key(feed) {
            batch.insert(feed.clone(), ReplicationIntent::Unknown);
        }
    }
    batch
}

/// Live stream of intent changes for one local identity.
#[derive(Debug, Clone)]
pub struct IntentFeed {
    local: FeedId,
    hops: u32,
    buffer: usize,
}

impl IntentFeed {
    pub fn new(local: FeedId, hops: u32) -> Self {
        Self {
            local,
            hops,
            buffer: crate::memory::DEFAULT_BUFFER,
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Subscribe to `source` and spawn the derivation task.
    ///
    /// The first batch carries every non-`Unknown` intent; later batches
    /// carry only feeds whose intent changed. The task ends when `shutdown`
    /// fires, the graph stream ends, or the returned subscription is dropped.
    pub async fn spawn(
        self,
        source: Arc<dyn TrustGraphSource>,
        shutdown: watch::Receiver<bool>,
    ) -> (Subscription<IntentBatch>, JoinHandle<()>) {
        // Subscribe first so no delta applied after the snapshot is missed.
        // Deltas carry absolute values, so re-applying one is harmless.
        let changes = source.changes().await;
        let graph = match source.snapshot().await {
            Ok(graph) => TrustGraph::clone(&graph),
            Err(e) => {
                tracing::warn!("Intent feed: snapshot failed, starting from an empty graph: {}", e);
                TrustGraph::new()
            }
        };

        let (tx, sub) = Subscription::channel(self.buffer);
        let handle = tokio::spawn(self.run(graph, changes, tx, shutdown));
        (sub, handle)
    }

    async fn run(
        self,
        mut graph: TrustGraph,
        mut changes: Subscription<GraphDelta>,
        tx: Publisher<IntentBatch>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut current = replication_intents(&graph, &self.local, self.hops);
        tracing::info!(
            "Intent feed started for {} (hops={}, {} initial intents)",
            self.local,
            self.hops,
            current.len()
        );

        if tx.send(current.clone()).await.is_err() {
            changes.unsubscribe();
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                delta = changes.next() => {
                    let Some(delta) = delta else {
                        tracing::debug!("Intent feed: graph stream ended");
                        break;
                    };
                    graph.apply(&delta);
                    let next = replication_intents(&graph, &self.local, self.hops);
                    let batch = diff_intents(&current, &next);
                    current = next;

                    if batch.is_empty() {
                        continue;
                    }
                    tracing::debug!("Intent feed: {} intents changed", batch.len());
                    if tx.send(batch).await.is_err() {
                        break;
                    }
                }
            }
        }

        changes.unsubscribe();
    }
}

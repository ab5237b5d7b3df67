// crates/warden-sync/src/replicate.rs
//
// Replication state tracker: turns intent batches into replication
// requests, and drops connections to peers that become blocked.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;

use warden_core::{
    ConnectionTable, FeedId, IntentBatch, ReplicatingSet, ReplicatingView, ReplicationTransport,
    Subscription,
};

/// How long `run` waits for pending peer cleanups after shutdown before
/// abandoning them.
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(5);

/// Owns the replicating set and keeps the replication layer in step with
/// the intent stream.
///
/// Each batch entry yields exactly one `request` command. A blocked feed
/// with a connected peer additionally gets a disconnect followed by a
/// table removal; the pair runs as its own task so a slow disconnect for
/// one peer does not hold up other feeds.
pub struct ReplicationTracker {
    replicating: ReplicatingSet,
    transport: Arc<dyn ReplicationTransport>,
    table: Arc<dyn ConnectionTable>,
    cleanups: JoinSet<()>,
    cleanup_grace: Duration,
}

impl ReplicationTracker {
    pub fn new(transport: Arc<dyn ReplicationTransport>, table: Arc<dyn ConnectionTable>) -> Self {
        Self {
            replicating: ReplicatingSet::new(),
            transport,
            table,
            cleanups: JoinSet::new(),
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }

    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    /// Read-only view of the feeds currently replicated.
    pub fn view(&self) -> ReplicatingView {
        self.replicating.view()
    }

    /// Apply one batch of intent changes.
    pub async fn process_batch(&mut self, batch: IntentBatch) {
        for (feed, intent) in batch {
            let replicate = intent.should_replicate();

            // Update the set before issuing commands so it never lags a block.
            if replicate {
                self.replicating.insert(feed.clone()).await;
            } else {
                self.replicating.remove(&feed).await;
            }

            if let Err(e) = self.transport.request(&feed, replicate).await {
                tracing::warn!("Replication request ({}, {}) failed: {}", feed, replicate, e);
            }

            if intent.is_blocked() {
                self.drop_blocked_peer(feed).await;
            }
        }

        self.reap_cleanups();
    }

    async fn drop_blocked_peer(&mut self, feed: FeedId) {
        let Some(peer) = self.table.get(&feed).await else {
            return;
        };
        if !peer.is_connected() {
            return;
        }

        tracing::info!("Dropping connection to blocked peer {}", feed);
        let table = self.table.clone();
        self.cleanups.spawn(async move {
            if let Err(e) = table.disconnect(&feed).await {
                tracing::warn!("Disconnect from blocked peer {} failed, removing anyway: {}", feed, e);
            }
            if let Err(e) = table.remove(&feed, None).await {
                tracing::warn!("Failed to remove blocked peer {}: {}", feed, e);
            }
        });
    }

    /// Collect cleanup tasks that already finished.
    fn reap_cleanups(&mut self) {
        while let Some(Some(result)) = self.cleanups.join_next().now_or_never() {
            if let Err(e) = result {
                tracing::warn!("Peer cleanup task failed: {}", e);
            }
        }
    }

    /// Wait for every pending disconnect/remove pair.
    pub async fn drain_cleanups(&mut self) {
        while let Some(result) = self.cleanups.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Peer cleanup task failed: {}", e);
            }
        }
    }

    /// Drain pending cleanups for at most the grace period, then abort
    /// whatever is still stuck in a disconnect.
    async fn finish_cleanups(&mut self) {
        let grace = self.cleanup_grace;
        if tokio::time::timeout(grace, self.drain_cleanups()).await.is_err() {
            tracing::warn!(
                "Abandoning {} peer cleanups still pending after {:?}",
                self.cleanups.len(),
                grace
            );
            self.cleanups.shutdown().await;
        }
    }

    /// Process intent batches until `shutdown` fires or the stream ends.
    pub async fn run(mut self, mut intents: Subscription<IntentBatch>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Replication tracker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                batch = intents.next() => {
                    let Some(batch) = batch else {
                        tracing::debug!("Replication tracker: intent stream ended");
                        break;
                    };
                    self.process_batch(batch).await;
                }
            }
        }

        intents.unsubscribe();
        self.finish_cleanups().await;
        tracing::info!("Replication tracker stopped");
    }
}

// crates/warden-sync/src/ebt.rs
//
// Mirror trust-graph edge changes into the EBT replication layer's block
// table.

use std::sync::Arc;

use tokio::sync::watch;

use warden_core::{EbtControl, GraphDelta, Relation, Subscription};

pub struct EbtForwarder {
    ebt: Arc<dyn EbtControl>,
}

impl EbtForwarder {
    pub fn new(ebt: Arc<dyn EbtControl>) -> Self {
        Self { ebt }
    }

    /// Issue one `block` command per edge in `delta`. Returns how many
    /// commands were accepted.
    pub async fn forward(&self, delta: &GraphDelta) -> usize {
        let mut sent = 0;
        for (from, to, relation) in delta.edges() {
            let blocking = relation == Relation::Blocks;
            match self.ebt.block(from, to, blocking).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!("EBT block ({} -> {}, {}) failed: {}", from, to, blocking, e),
            }
        }
        sent
    }

    pub async fn run(self, mut changes: Subscription<GraphDelta>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                delta = changes.next() => {
                    let Some(delta) = delta else { break };
                    self.forward(&delta).await;
                }
            }
        }
        changes.unsubscribe();
        tracing::debug!("EBT forwarder stopped");
    }
}

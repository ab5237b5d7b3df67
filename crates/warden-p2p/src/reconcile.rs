// crates/warden-p2p/src/reconcile.rs
//
// One-shot startup pass over the connection table: prefer followed peers,
// drop blocked ones.

use serde::Serialize;

use warden_core::{ConnectionTable, FeedId, PeerSource, Relation, TrustGraphSource};

/// What startup reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Followed peers re-tagged as `Friends`.
    pub promoted: usize,
    /// Blocked peers removed.
    pub removed: usize,
}

/// Reconcile the connection table against one graph snapshot.
///
/// If the snapshot cannot be read the pass is skipped; the live components
/// correct the table as graph updates arrive.
pub async fn reconcile_startup(
    local: &FeedId,
    graph: &dyn TrustGraphSource,
    table: &dyn ConnectionTable,
) -> ReconcileReport {
    let snapshot = match graph.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::debug!("Startup reconciliation skipped: {}", e);
            return ReconcileReport::default();
        }
    };

    let mut report = ReconcileReport::default();
    for peer in table.list().await {
        match snapshot.get(local, peer.key()) {
            Relation::Follows => match table.add(&peer.address, PeerSource::Friends).await {
                Ok(()) => report.promoted += 1,
                Err(e) => tracing::warn!("Failed to promote followed peer {}: {}", peer.key(), e),
            },
            Relation::Blocks => match table.remove(peer.key(), None).await {
                Ok(()) => report.removed += 1,
                Err(e) => tracing::warn!("Failed to remove blocked peer {}: {}", peer.key(), e),
            },
            Relation::Neutral => {}
        }
    }

    tracing::info!(
        "Startup reconciliation: {} peers promoted, {} blocked peers removed",
        report.promoted,
        report.removed
    );
    report
}

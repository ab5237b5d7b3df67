// crates/warden-p2p/src/discovery.rs
//
// Peer discovery from `pub` announcements.
//
// An announced pub is added to the connection table only when its announcer
// is a feed we replicate (which bounds discovery to the replication range)
// and the local identity does not block the announced peer. With pruning
// enabled, every `Sync` marker removes pub-tagged peers that are no longer
// vouched for.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use warden_core::{
    AnnouncementEvent, AnnouncementSource, ConnectionTable, FeedId, PeerSource, PubAnnouncement,
    ReplicatingView, TrustGraphSource,
};

/// Default delay before discovery starts, letting the graph load first.
pub const DEFAULT_DISCOVERY_DELAY: Duration = Duration::from_secs(10);

/// Configuration for pub discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Seconds to wait after startup before consuming announcements.
    pub delay_secs: u64,
    /// Remove pub peers that are no longer vouched for on each `Sync`.
    pub prune: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            delay_secs: DEFAULT_DISCOVERY_DELAY.as_secs(),
            prune: false,
        }
    }
}

/// Peers accepted from announcements, each with the announcers that
/// vouched for it.
///
/// Entries persist across pruning cycles; a target is dropped only when no
/// announcer of it is still replicated or the local identity now blocks it.
#[derive(Debug, Default)]
pub struct DiscoveredPeers {
    vouchers: HashMap<FeedId, HashSet<FeedId>>,
}

impl DiscoveredPeers {
    pub fn record(&mut self, target: FeedId, announcer: FeedId) {
        self.vouchers.entry(target).or_default().insert(announcer);
    }

    pub fn contains(&self, target: &FeedId) -> bool {
        self.vouchers.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.vouchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vouchers.is_empty()
    }
}

/// Result of handling one announcement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// The announced pub was added to the connection table.
    Accepted,
    /// The announcement was dropped (malformed, out of range, or blocked).
    Ignored,
    /// A `Sync` marker was processed; the count of peers removed.
    Pruned(usize),
}

/// Filters announcements into connection-table commands.
///
/// Owns the discovered-peer set; run it from exactly one task.
pub struct DiscoveryFilter {
    local: FeedId,
    graph: Arc<dyn TrustGraphSource>,
    table: Arc<dyn ConnectionTable>,
    replicating: ReplicatingView,
    prune: bool,
    discovered: DiscoveredPeers,
}

impl DiscoveryFilter {
    pub fn new(
        local: FeedId,
        graph: Arc<dyn TrustGraphSource>,
        table: Arc<dyn ConnectionTable>,
        replicating: ReplicatingView,
        prune: bool,
    ) -> Self {
        Self {
            local,
            graph,
            table,
            replicating,
            prune,
            discovered: DiscoveredPeers::default(),
        }
    }

    pub fn discovered(&self) -> &DiscoveredPeers {
        &self.discovered
    }

    /// Handle one item of the announcement stream.
    pub async fn handle(&mut self, event: AnnouncementEvent) -> DiscoveryOutcome {
        match event {
            AnnouncementEvent::Pub(announcement) => {
                if self.accept(&announcement).await {
                    DiscoveryOutcome::Accepted
                } else {
                    DiscoveryOutcome::Ignored
                }
            }
            AnnouncementEvent::Sync if self.prune => DiscoveryOutcome::Pruned(self.prune_stale().await),
            AnnouncementEvent::Sync => DiscoveryOutcome::Pruned(0),
        }
    }

    async fn accept(&mut self, announcement: &PubAnnouncement) -> bool {
        let Some(address) = announcement.address() else {
            tracing::trace!("Discovery: ignoring pub message without a valid address");
            return false;
        };

        if !self.replicating.contains(&announcement.author).await {
            tracing::trace!(
                "Discovery: ignoring pub {} announced by out-of-range {}",
                address.key,
                announcement.author
            );
            return false;
        }

        if self.is_blocked(&address.key).await {
            tracing::debug!("Discovery: ignoring blocked pub {}", address.key);
            return false;
        }

        self.discovered
            .record(address.key.clone(), announcement.author.clone());
        if let Err(e) = self.table.add(&address, PeerSource::Pub).await {
            tracing::warn!("Discovery: failed to add pub {}: {}", address.key, e);
        } else {
            tracing::debug!("Discovery: added pub {} ({}:{})", address.key, address.host, address.port);
        }
        true
    }

    /// Drop discovered targets that lost every voucher or became blocked,
    /// then remove pub-tagged table peers not in the discovered set.
    /// Returns the number of peers removed.
    pub async fn prune_stale(&mut self) -> usize {
        let targets: Vec<(FeedId, HashSet<FeedId>)> = self
            .discovered
            .vouchers
            .iter()
            .map(|(target, vouchers)| (target.clone(), vouchers.clone()))
            .collect();

        for (target, vouchers) in targets {
            let mut still_vouched = HashSet::new();
            for announcer in vouchers {
                if self.replicating.contains(&announcer).await {
                    still_vouched.insert(announcer);
                }
            }

            if still_vouched.is_empty() || self.is_blocked(&target).await {
                self.discovered.vouchers.remove(&target);
            } else {
                self.discovered.vouchers.insert(target, still_vouched);
            }
        }

        let mut removed = 0;
        for peer in self.table.list().await {
            if peer.source != PeerSource::Pub || self.discovered.contains(peer.key()) {
                continue;
            }
            match self.table.remove(peer.key(), Some(PeerSource::Pub)).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Discovery: failed to prune pub {}: {}", peer.key(), e),
            }
        }

        if removed > 0 {
            tracing::info!("Discovery: pruned {} stale pub peers", removed);
        }
        removed
    }

    async fn is_blocked(&self, target: &FeedId) -> bool {
        match self.graph.is_blocking(&self.local, target).await {
            Ok(blocked) => blocked,
            Err(e) => {
                tracing::debug!("Discovery: block lookup for {} failed, assuming not blocked: {}", target, e);
                false
            }
        }
    }

    /// Wait out `delay`, then filter the live announcement stream until
    /// `shutdown` fires or the stream ends.
    pub async fn run(
        mut self,
        source: Arc<dyn AnnouncementSource>,
        delay: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let mut announcements = source.pub_announcements().await;
        tracing::info!("Peer discovery active (prune={})", self.prune);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = announcements.next() => {
                    let Some(event) = event else {
                        tracing::debug!("Discovery: announcement stream ended");
                        break;
                    };
                    self.handle(event).await;
                }
            }
        }

        announcements.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::MemoryAnnouncements;
    use crate::table::{MemoryConnectionTable, TableCommand};
    use serde_json::json;
    use warden_core::{PeerAddress, PeerRecord, PeerState, ReplicatingSet, Relation};
    use warden_trust::MemoryTrustGraph;

    fn feed(seed: u8) -> FeedId {
        FeedId::from_seed(&[seed; 32])
    }

    fn announce(author: u8, target: u8) -> AnnouncementEvent {
        AnnouncementEvent::Pub(PubAnnouncement {
            author: feed(author),
            content: Some(json!({
                "type": "pub",
                "address": {"key": feed(target).as_str(), "host": format!("pub{}.example", target), "port": 8008}
            })),
        })
    }

    struct Fixture {
        graph: MemoryTrustGraph,
        table: MemoryConnectionTable,
        replicating: ReplicatingSet,
        filter: DiscoveryFilter,
    }

    fn fixture(prune: bool) -> Fixture {
        let graph = MemoryTrustGraph::new();
        let table = MemoryConnectionTable::new();
        let replicating = ReplicatingSet::new();
        let filter = DiscoveryFilter::new(
            feed(1),
            Arc::new(graph.clone()),
            Arc::new(table.clone()),
            replicating.view(),
            prune,
        );
        Fixture {
            graph,
            table,
            replicating,
            filter,
        }
    }

    #[tokio::test]
    async fn accepts_only_replicated_announcers() {
        let mut fx = fixture(false);
        fx.replicating.insert(feed(2)).await;

        assert_eq!(fx.filter.handle(announce(2, 10)).await, DiscoveryOutcome::Accepted);
        assert_eq!(fx.filter.handle(announce(3, 11)).await, DiscoveryOutcome::Ignored);

        let commands = fx.table.commands().await;
        assert_eq!(
            commands,
            vec![TableCommand::Add {
                key: feed(10),
                source: PeerSource::Pub
            }]
        );
        assert!(fx.filter.discovered().contains(&feed(10)));
        assert!(!fx.filter.discovered().contains(&feed(11)));
    }

    #[tokio::test]
    async fn blocked_targets_are_ignored() {
        let mut fx = fixture(false);
        fx.replicating.insert(feed(2)).await;
        fx.graph.set(feed(1), feed(10), Relation::Blocks).await;

        assert_eq!(fx.filter.handle(announce(2, 10)).await, DiscoveryOutcome::Ignored);
        assert!(fx.table.commands().await.is_empty());
    }

    #[tokio::test]
    async fn hostless_announcement_is_accepted_on_key() {
        let mut fx = fixture(false);
        fx.replicating.insert(feed(2)).await;

        let hostless = AnnouncementEvent::Pub(PubAnnouncement {
            author: feed(2),
            content: Some(json!({"type": "pub", "address": {"key": feed(12).as_str()}})),
        });
        assert_eq!(fx.filter.handle(hostless).await, DiscoveryOutcome::Accepted);
        assert_eq!(
            fx.table.commands().await,
            vec![TableCommand::Add {
                key: feed(12),
                source: PeerSource::Pub
            }]
        );
    }

    #[tokio::test]
    async fn malformed_payloads_are_ignored() {
        let mut fx = fixture(false);
        fx.replicating.insert(feed(2)).await;

        let no_content = AnnouncementEvent::Pub(PubAnnouncement {
            author: feed(2),
            content: None,
        });
        let bad_key = AnnouncementEvent::Pub(PubAnnouncement {
            author: feed(2),
            content: Some(json!({"address": {"key": "@bogus.ed25519", "host": "h"}})),
        });
        assert_eq!(fx.filter.handle(no_content).await, DiscoveryOutcome::Ignored);
        assert_eq!(fx.filter.handle(bad_key).await, DiscoveryOutcome::Ignored);
        assert!(fx.table.commands().await.is_empty());
    }

    #[tokio::test]
    async fn sync_without_prune_removes_nothing() {
        let mut fx = fixture(false);
        fx.table
            .add(
                &PeerAddress {
                    key: feed(20),
                    host: "old.example".into(),
                    port: 8008,
                },
                PeerSource::Pub,
            )
            .await
            .unwrap();

        assert_eq!(fx.filter.handle(AnnouncementEvent::Sync).await, DiscoveryOutcome::Pruned(0));
        assert!(fx.table.get(&feed(20)).await.is_some());
    }

    #[tokio::test]
    async fn prune_removes_undiscovered_pubs_once() {
        let mut fx = fixture(true);
        fx.replicating.insert(feed(2)).await;

        // A stale pub and a manually added peer already in the table.
        for (seed, source) in [(20, PeerSource::Pub), (21, PeerSource::Manual)] {
            fx.table
                .insert(PeerRecord {
                    address: PeerAddress {
                        key: feed(seed),
                        host: "h".into(),
                        port: 8008,
                    },
                    state: PeerState::Disconnected,
                    source,
                })
                .await;
        }

        fx.filter.handle(announce(2, 10)).await;
        assert_eq!(fx.filter.handle(AnnouncementEvent::Sync).await, DiscoveryOutcome::Pruned(1));
        assert!(fx.table.get(&feed(20)).await.is_none());
        assert!(fx.table.get(&feed(21)).await.is_some());
        assert!(fx.table.get(&feed(10)).await.is_some());

        let before = fx.table.commands().await.len();
        assert_eq!(fx.filter.handle(AnnouncementEvent::Sync).await, DiscoveryOutcome::Pruned(0));
        assert_eq!(fx.table.commands().await.len(), before);
    }

    #[tokio::test]
    async fn prune_drops_pubs_whose_announcers_left_range() {
        let mut fx = fixture(true);
        fx.replicating.insert(feed(2)).await;
        fx.filter.handle(announce(2, 10)).await;

        fx.replicating.remove(&feed(2)).await;
        assert_eq!(fx.filter.handle(AnnouncementEvent::Sync).await, DiscoveryOutcome::Pruned(1));
        assert!(fx.filter.discovered().is_empty());
        assert!(fx.table.get(&feed(10)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_waits_for_grace_delay() {
        let fx = fixture(false);
        let mut replicating = fx.replicating;
        replicating.insert(feed(2)).await;

        let announcements = MemoryAnnouncements::new(8);
        announcements
            .publish(match announce(2, 10) {
                AnnouncementEvent::Pub(a) => a,
                AnnouncementEvent::Sync => unreachable!(),
            })
            .await;

        let (tx, shutdown) = watch::channel(false);
        let handle = tokio::spawn(fx.filter.run(
            Arc::new(announcements),
            Duration::from_secs(10),
            shutdown,
        ));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(fx.table.commands().await.is_empty());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fx.table.commands().await.len(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

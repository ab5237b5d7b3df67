// crates/warden-core/src/traits.rs
//
// Ports to the collaborators the policy layer drives. Implemented by the
// host application; `warden-trust`, `warden-p2p` and `warden-sync` ship
// in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WardenError;
use crate::graph::{GraphDelta, TrustGraph};
use crate::identity::FeedId;
use crate::message::AnnouncementEvent;
use crate::peer::{PeerAddress, PeerRecord, PeerSource};
use crate::subscription::Subscription;

/// Source of the trust relation.
#[async_trait]
pub trait TrustGraphSource: Send + Sync {
    /// Point-in-time snapshot of the whole graph.
    async fn snapshot(&self) -> Result<Arc<TrustGraph>, WardenError>;

    /// Live stream of edge changes, in the order they were applied.
    async fn changes(&self) -> Subscription<GraphDelta>;

    /// Whether `source` currently blocks `dest`.
    async fn is_blocking(&self, source: &FeedId, dest: &FeedId) -> Result<bool, WardenError>;
}

/// Source of `pub` announcements from replicated feeds.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Live stream of announcements: the backlog, a `Sync` marker, then new
    /// announcements as they arrive.
    async fn pub_announcements(&self) -> Subscription<AnnouncementEvent>;
}

/// The gossip layer's peer table.
#[async_trait]
pub trait ConnectionTable: Send + Sync {
    /// All known peers.
    async fn list(&self) -> Vec<PeerRecord>;

    /// Look up a peer by identity.
    async fn get(&self, key: &FeedId) -> Option<PeerRecord>;

    /// Add a peer, or re-tag an existing one with `source`.
    async fn add(&self, address: &PeerAddress, source: PeerSource) -> Result<(), WardenError>;

    /// Remove a peer. With `Some(source)` only an entry carrying that tag
    /// is removed.
    async fn remove(&self, key: &FeedId, source: Option<PeerSource>) -> Result<(), WardenError>;

    /// Close the connection to a peer. Resolves once the disconnect has
    /// completed or failed.
    async fn disconnect(&self, key: &FeedId) -> Result<(), WardenError>;
}

/// The feed replication layer.
#[async_trait]
pub trait ReplicationTransport: Send + Sync {
    /// Start (`true`) or stop (`false`) replicating a feed.
    async fn request(&self, feed: &FeedId, replicate: bool) -> Result<(), WardenError>;
}

/// The epidemic broadcast tree replication layer.
#[async_trait]
pub trait EbtControl: Send + Sync {
    /// Record whether `from` blocks `to`.
    async fn block(&self, from: &FeedId, to: &FeedId, blocking: bool) -> Result<(), WardenError>;
}

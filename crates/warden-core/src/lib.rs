// crates/warden-core/src/lib.rs
//
// warden-core: Core types, collaborator ports, and interceptor hooks for the
// Warden replication policy coordinator.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines feed identities, the trust graph snapshot and delta types, the
// message shapes the policy inspects, the port traits to external
// collaborators, and the shared error type.

pub mod error;
pub mod graph;
pub mod hook;
pub mod identity;
pub mod intent;
pub mod message;
pub mod peer;
pub mod replicating;
pub mod subscription;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use warden_core::FeedId;`

pub use error::WardenError;
pub use graph::{GraphDelta, Relation, TrustGraph};
pub use hook::{
    AuthHook, AuthRequest, AuthResult, Handler, HistoryHook, HistoryOptions, HistoryRequest,
    HistoryResult, HistoryStream, Hook, Interceptor, Next,
};
pub use identity::FeedId;
pub use intent::{IntentBatch, ReplicationIntent};
pub use message::{AnnouncementEvent, ContactContent, HistoryRecord, Message, PubAnnouncement};
pub use peer::{PeerAddress, PeerRecord, PeerSource, PeerState};
pub use replicating::{ReplicatingSet, ReplicatingView};
pub use subscription::{Publisher, Subscription};
pub use traits::{AnnouncementSource, ConnectionTable, EbtControl, ReplicationTransport, TrustGraphSource};

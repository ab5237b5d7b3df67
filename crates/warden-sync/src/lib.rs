// crates/warden-sync/src/lib.rs
//
// warden-sync: Replication-side policy for Warden.
//
// Tracks which feeds are replicated as intents change, keeps blocked
// peers off legacy history streams, and forwards graph edge changes to
// the EBT replication layer.

pub mod ebt;
pub mod history;
pub mod replicate;
pub mod transport;

pub use ebt::EbtForwarder;
pub use history::{cut_off_at_block, LegacyGuard};
pub use replicate::{ReplicationTracker, DEFAULT_CLEANUP_GRACE};
pub use transport::{EbtBlock, RecordingTransport, ReplicationRequest};

// crates/warden-p2p/src/lib.rs
//
// warden-p2p: Peer-facing policy for Warden.
//
// Filters pub announcements into the connection table, refuses inbound
// connections from blocked peers, exposes the host `disconnect` operation,
// and reconciles the peer table against the trust graph at startup.

pub mod announce;
pub mod auth;
pub mod disconnect;
pub mod discovery;
pub mod reconcile;
pub mod table;

pub use announce::MemoryAnnouncements;
pub use auth::BlockGate;
pub use disconnect::{disconnect, DisconnectOpts};
pub use discovery::{
    DiscoveredPeers, DiscoveryConfig, DiscoveryFilter, DiscoveryOutcome, DEFAULT_DISCOVERY_DELAY,
};
pub use reconcile::{reconcile_startup, ReconcileReport};
pub use table::{MemoryConnectionTable, TableCommand};

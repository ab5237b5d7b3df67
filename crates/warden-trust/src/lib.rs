// crates/warden-trust/src/lib.rs
//
// warden-trust: In-memory trust graph source and replication intent
// derivation for Warden.
//
// The trust graph itself belongs to the host application. This crate
// provides an in-memory source for tests and dry runs, and turns the live
// graph into the per-feed replication intents the tracker consumes.

pub mod intent;
pub mod memory;

pub use intent::{diff_intents, replication_intents, IntentFeed, DEFAULT_HOPS};
pub use memory::{MemoryTrustGraph, DEFAULT_BUFFER};

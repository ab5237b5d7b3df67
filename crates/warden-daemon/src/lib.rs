// crates/warden-daemon/src/lib.rs
//
// warden-daemon: Wires the Warden policy components to a host's
// collaborators, and replays dry-run fixtures against in-memory ones.

pub mod config;
pub mod coordinator;
pub mod fixture;
pub mod identity;
pub mod state;

pub use config::{GossipConfig, WardenConfig};
pub use coordinator::{Collaborators, Coordinator, CoordinatorHandle, CoordinatorOptions};
pub use fixture::{replay, DryRunReport, EventOutcome, Fixture, FixtureEvent};
pub use identity::{expand_tilde, load_seed, resolve_local_id};
pub use state::{CoordinatorState, CoordinatorStateMachine};

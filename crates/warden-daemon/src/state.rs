// crates/warden-daemon/src/state.rs
//
// Lifecycle state machine for the coordinator.
//
// Valid transitions:
//   Starting -> Reconciling -> Running
//   Any state -> ShuttingDown

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Collaborators wired, nothing spawned yet.
    Starting,
    /// Startup reconciliation of the connection table in progress.
    Reconciling,
    /// Hooks registered and background tasks live.
    Running,
    /// Shutdown signalled; tasks are draining.
    ShuttingDown,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorState::Starting => write!(f, "Starting"),
            CoordinatorState::Reconciling => write!(f, "Reconciling"),
            CoordinatorState::Running => write!(f, "Running"),
            CoordinatorState::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}

pub struct CoordinatorStateMachine {
    pub current: CoordinatorState,
}

impl CoordinatorStateMachine {
    pub fn new() -> Self {
        Self {
            current: CoordinatorState::Starting,
        }
    }

    /// Attempt to transition to a new state.
    pub fn transition(&mut self, new_state: CoordinatorState) -> Result<(), String> {
        let valid = matches!(
            (self.current, new_state),
            (_, CoordinatorState::ShuttingDown)
                | (CoordinatorState::Starting, CoordinatorState::Reconciling)
                | (CoordinatorState::Reconciling, CoordinatorState::Running)
        );

        if !valid {
            return Err(format!(
                "Invalid state transition: {} -> {}",
                self.current, new_state
            ));
        }

        tracing::info!("Coordinator state: {} -> {}", self.current, new_state);
        self.current = new_state;
        Ok(())
    }
}

impl Default for CoordinatorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

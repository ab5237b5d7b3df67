// crates/warden-daemon/src/coordinator.rs
//
// Coordinator: wires the policy components to the host's collaborators
// and owns the background tasks.
//
// Start-up order:
//   1. Startup reconciliation of the connection table.
//   2. Auth gate and legacy guard registered on the host hooks.
//   3. Intent derivation + replication tracker, EBT forwarder, and the
//      delayed discovery filter spawned under one shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use warden_core::{
    AnnouncementSource, AuthHook, ConnectionTable, EbtControl, FeedId, HistoryHook,
    ReplicatingView, ReplicationTransport, TrustGraphSource, WardenError,
};
use warden_p2p::{
    disconnect, reconcile_startup, BlockGate, DiscoveryConfig, DiscoveryFilter, DisconnectOpts,
    ReconcileReport,
};
use warden_sync::{EbtForwarder, LegacyGuard, ReplicationTracker};
use warden_trust::IntentFeed;

use crate::config::WardenConfig;
use crate::state::{CoordinatorState, CoordinatorStateMachine};

/// The host-side collaborators the coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub graph: Arc<dyn TrustGraphSource>,
    pub announcements: Arc<dyn AnnouncementSource>,
    pub table: Arc<dyn ConnectionTable>,
    pub transport: Arc<dyn ReplicationTransport>,
    pub ebt: Arc<dyn EbtControl>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub local: FeedId,
    pub hops: u32,
    pub discovery: DiscoveryConfig,
    pub subscription_buffer: usize,
    /// Upper bound on how long shutdown waits for blocked-peer disconnects.
    pub cleanup_grace: Duration,
}

impl CoordinatorOptions {
    pub fn new(local: FeedId) -> Self {
        Self::from_config(local, &WardenConfig::default())
    }

    pub fn from_config(local: FeedId, config: &WardenConfig) -> Self {
        Self {
            local,
            hops: config.hops,
            discovery: config.discovery(),
            subscription_buffer: config.subscription_buffer,
            cleanup_grace: config.cleanup_grace(),
        }
    }
}

pub struct Coordinator;

impl Coordinator {
    /// Start the policy layer.
    ///
    /// Interceptors are appended to `auth` and `history`; anything the host
    /// registered before runs first.
    pub async fn start(
        opts: CoordinatorOptions,
        collab: Collaborators,
        auth: &mut AuthHook,
        history: &mut HistoryHook,
    ) -> CoordinatorHandle {
        let mut state = CoordinatorStateMachine::new();
        advance(&mut state, CoordinatorState::Reconciling);

        let reconciled = reconcile_startup(&opts.local, collab.graph.as_ref(), collab.table.as_ref()).await;

        auth.register(Arc::new(BlockGate::new(opts.local.clone(), collab.graph.clone())));
        history.register(Arc::new(LegacyGuard::new(collab.graph.clone())));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let (intents, intent_task) = IntentFeed::new(opts.local.clone(), opts.hops)
            .with_buffer(opts.subscription_buffer)
            .spawn(collab.graph.clone(), shutdown_rx.clone())
            .await;
        tasks.push(intent_task);

        let tracker = ReplicationTracker::new(collab.transport.clone(), collab.table.clone())
            .with_cleanup_grace(opts.cleanup_grace);
        let replicating = tracker.view();
        tasks.push(tokio::spawn(tracker.run(intents, shutdown_rx.clone())));

        let changes = collab.graph.changes().await;
        tasks.push(tokio::spawn(
            EbtForwarder::new(collab.ebt.clone()).run(changes, shutdown_rx.clone()),
        ));

        let filter = DiscoveryFilter::new(
            opts.local.clone(),
            collab.graph.clone(),
            collab.table.clone(),
            replicating.clone(),
            opts.discovery.prune,
        );
        tasks.push(tokio::spawn(filter.run(
            collab.announcements.clone(),
            Duration::from_secs(opts.discovery.delay_secs),
            shutdown_rx,
        )));

        advance(&mut state, CoordinatorState::Running);
        tracing::info!(
            "Coordinator running for {} (hops={}, discovery in {}s, prune={})",
            opts.local,
            opts.hops,
            opts.discovery.delay_secs,
            opts.discovery.prune
        );

        CoordinatorHandle {
            local: opts.local,
            table: collab.table,
            replicating,
            reconciled,
            shutdown,
            tasks,
            state,
        }
    }
}

fn advance(state: &mut CoordinatorStateMachine, next: CoordinatorState) {
    if let Err(e) = state.transition(next) {
        tracing::warn!("{}", e);
    }
}

/// Handle to a running coordinator.
///
/// Dropping the handle without calling `shutdown` also stops the
/// background tasks, but does not wait for them.
pub struct CoordinatorHandle {
    local: FeedId,
    table: Arc<dyn ConnectionTable>,
    replicating: ReplicatingView,
    reconciled: ReconcileReport,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    state: CoordinatorStateMachine,
}

impl CoordinatorHandle {
    pub fn local(&self) -> &FeedId {
        &self.local
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.current
    }

    /// What startup reconciliation did.
    pub fn reconciled(&self) -> ReconcileReport {
        self.reconciled
    }

    /// Read-only view of the feeds currently replicated.
    pub fn replicating(&self) -> ReplicatingView {
        self.replicating.clone()
    }

    /// Disconnect the first connected peer matching `opts`.
    pub async fn disconnect(&self, opts: &DisconnectOpts) -> Result<Option<FeedId>, WardenError> {
        disconnect(self.table.as_ref(), opts).await
    }

    /// Signal every task to stop and wait for them. Peer cleanups still
    /// stuck in a disconnect after `cleanup_grace` are abandoned.
    pub async fn shutdown(mut self) {
        advance(&mut self.state, CoordinatorState::ShuttingDown);
        let _ = self.shutdown.send(true);

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("Coordinator task failed: {}", e);
            }
        }
        tracing::info!("Coordinator for {} shut down", self.local);
    }
}

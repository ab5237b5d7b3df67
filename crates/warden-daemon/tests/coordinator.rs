// crates/warden-daemon/tests/coordinator.rs
//
// End-to-end tests for the coordinator wired to in-memory collaborators:
// startup reconciliation, replication tracking, block handling across the
// auth gate, EBT forwarding and the connection table, delayed discovery,
// and fixture replay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use warden_core::{
    AuthHook, AuthRequest, AuthResult, ConnectionTable, FeedId, Handler, HistoryHook,
    HistoryRequest, HistoryResult, PeerAddress, PeerRecord, PeerSource, PeerState,
    PubAnnouncement, Relation, WardenError,
};
use warden_daemon::{
    replay, Collaborators, Coordinator, CoordinatorHandle, CoordinatorOptions, CoordinatorState,
    EventOutcome, Fixture, WardenConfig,
};
use warden_p2p::{DisconnectOpts, MemoryAnnouncements, MemoryConnectionTable, TableCommand};
use warden_sync::{EbtBlock, RecordingTransport, ReplicationRequest};
use warden_trust::MemoryTrustGraph;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn feed(seed: u8) -> FeedId {
    FeedId::from_seed(&[seed; 32])
}

struct AcceptAll;

#[async_trait]
impl Handler<AuthRequest, AuthResult> for AcceptAll {
    async fn call(&self, _req: AuthRequest) -> AuthResult {
        Ok(())
    }
}

struct EmptyFeeds;

#[async_trait]
impl Handler<HistoryRequest, HistoryResult> for EmptyFeeds {
    async fn call(&self, _req: HistoryRequest) -> HistoryResult {
        Err(WardenError::NotFound("no feeds stored".into()))
    }
}

struct Harness {
    graph: MemoryTrustGraph,
    announcements: MemoryAnnouncements,
    table: MemoryConnectionTable,
    recorder: RecordingTransport,
    auth: AuthHook,
    handle: CoordinatorHandle,
}

async fn start(
    local: &FeedId,
    graph: MemoryTrustGraph,
    table: MemoryConnectionTable,
    delay_secs: u64,
) -> Harness {
    let announcements = MemoryAnnouncements::new(16);
    let recorder = RecordingTransport::new();
    let collab = Collaborators {
        graph: Arc::new(graph.clone()),
        announcements: Arc::new(announcements.clone()),
        table: Arc::new(table.clone()),
        transport: Arc::new(recorder.clone()),
        ebt: Arc::new(recorder.clone()),
    };

    let mut opts = CoordinatorOptions::new(local.clone());
    opts.discovery.delay_secs = delay_secs;

    let mut auth = AuthHook::new(Arc::new(AcceptAll));
    let mut history = HistoryHook::new(Arc::new(EmptyFeeds));
    let handle = Coordinator::start(opts, collab, &mut auth, &mut history).await;
    assert_eq!(auth.len(), 1);
    assert_eq!(history.len(), 1);

    Harness {
        graph,
        announcements,
        table,
        recorder,
        auth,
        handle,
    }
}

fn record(seed: u8, state: PeerState, source: PeerSource) -> PeerRecord {
    PeerRecord {
        address: PeerAddress {
            key: feed(seed),
            host: format!("peer{}.example", seed),
            port: 8008,
        },
        state,
        source,
    }
}

/// Connection table whose disconnects never resolve.
struct StuckDisconnects(MemoryConnectionTable);

#[async_trait]
impl ConnectionTable for StuckDisconnects {
    async fn list(&self) -> Vec<PeerRecord> {
        self.0.list().await
    }

    async fn get(&self, key: &FeedId) -> Option<PeerRecord> {
        self.0.get(key).await
    }

    async fn add(&self, address: &PeerAddress, source: PeerSource) -> Result<(), WardenError> {
        self.0.add(address, source).await
    }

    async fn remove(&self, key: &FeedId, source: Option<PeerSource>) -> Result<(), WardenError> {
        self.0.remove(key, source).await
    }

    async fn disconnect(&self, _key: &FeedId) -> Result<(), WardenError> {
        futures::future::pending().await
    }
}

/// Poll `check` until it holds, yielding to the background tasks between
/// attempts.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn startup_reconciles_table_and_replicates_follows() {
    let (a, b, c) = (feed(1), feed(2), feed(3));
    let graph = MemoryTrustGraph::new();
    graph.set(a.clone(), b.clone(), Relation::Follows).await;
    graph.set(a.clone(), c.clone(), Relation::Blocks).await;

    let table = MemoryConnectionTable::new();
    table.insert(record(2, PeerState::Disconnected, PeerSource::Stored)).await;
    table.insert(record(3, PeerState::Disconnected, PeerSource::Stored)).await;
    table.insert(record(4, PeerState::Disconnected, PeerSource::Stored)).await;

    let h = start(&a, graph, table, 3600).await;
    assert_eq!(h.handle.state(), CoordinatorState::Running);
    assert_eq!(h.handle.reconciled().promoted, 1);
    assert_eq!(h.handle.reconciled().removed, 1);

    assert_eq!(h.table.get(&b).await.unwrap().source, PeerSource::Friends);
    assert!(h.table.get(&c).await.is_none());
    assert_eq!(h.table.get(&feed(4)).await.unwrap().source, PeerSource::Stored);

    let recorder = h.recorder.clone();
    eventually(|| {
        let recorder = recorder.clone();
        async move { recorder.requests().await.len() == 3 }
    })
    .await;
    assert_eq!(h.recorder.requests_for(&b).await, vec![true]);
    assert_eq!(h.recorder.requests_for(&c).await, vec![false]);
    assert_eq!(h.recorder.requests_for(&a).await, vec![true]);

    let mut expected = vec![a.clone(), b.clone()];
    expected.sort();
    assert_eq!(h.handle.replicating().members().await, expected);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn blocking_a_connected_peer_cuts_it_off_everywhere() {
    let (a, b, c) = (feed(1), feed(2), feed(3));
    let graph = MemoryTrustGraph::new();
    graph.set(a.clone(), b.clone(), Relation::Follows).await;
    graph.set(b.clone(), c.clone(), Relation::Follows).await;

    let table = MemoryConnectionTable::new();
    table.insert(record(3, PeerState::Connected, PeerSource::Pub)).await;

    let h = start(&a, graph, table, 3600).await;
    let view = h.handle.replicating();
    eventually(|| {
        let view = view.clone();
        let c = c.clone();
        async move { view.contains(&c).await }
    })
    .await;
    assert!(h.auth.call(AuthRequest { remote: c.clone() }).await.is_ok());

    h.graph.set(a.clone(), c.clone(), Relation::Blocks).await;

    let table = h.table.clone();
    let c2 = c.clone();
    eventually(|| {
        let table = table.clone();
        let c = c2.clone();
        async move { table.get(&c).await.is_none() }
    })
    .await;

    assert!(!view.contains(&c).await);
    assert_eq!(h.recorder.requests_for(&c).await, vec![true, false]);
    assert_eq!(
        h.table.commands().await,
        vec![
            TableCommand::Disconnect { key: c.clone() },
            TableCommand::Remove { key: c.clone(), source: None },
        ]
    );
    assert!(h
        .recorder
        .blocks()
        .await
        .contains(&EbtBlock { from: a.clone(), to: c.clone(), blocking: true }));

    let refused = h.auth.call(AuthRequest { remote: c.clone() }).await;
    assert!(matches!(refused, Err(WardenError::Unauthorized(_))));

    h.handle.shutdown().await;
}

#[tokio::test]
async fn disconnect_by_host_through_handle() {
    let a = feed(1);
    let table = MemoryConnectionTable::new();
    table.insert(record(5, PeerState::Connected, PeerSource::Manual)).await;

    let h = start(&a, MemoryTrustGraph::new(), table, 3600).await;
    let dropped = h
        .handle
        .disconnect(&DisconnectOpts::host("peer5.example"))
        .await
        .unwrap();
    assert_eq!(dropped, Some(feed(5)));
    assert_eq!(h.table.get(&feed(5)).await.unwrap().state, PeerState::Disconnected);

    // Nothing connected any more: silent no-op.
    assert_eq!(h.handle.disconnect(&feed(5).into()).await.unwrap(), None);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn discovery_starts_after_delay() {
    let (a, b, d) = (feed(1), feed(2), feed(4));
    let graph = MemoryTrustGraph::new();
    graph.set(a.clone(), b.clone(), Relation::Follows).await;

    let h = start(&a, graph, MemoryConnectionTable::new(), 10).await;
    h.announcements
        .publish(PubAnnouncement {
            author: b.clone(),
            content: Some(json!({
                "type": "pub",
                "address": { "key": d.as_str(), "host": "pub.example", "port": 8008 }
            })),
        })
        .await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.table.get(&d).await.is_none());

    tokio::time::sleep(Duration::from_secs(6)).await;
    let added = h.table.get(&d).await.unwrap();
    assert_eq!(added.source, PeerSource::Pub);
    assert_eq!(added.host(), "pub.example");

    h.handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_every_subscription() {
    let a = feed(1);
    let graph = MemoryTrustGraph::new();
    let h = start(&a, graph.clone(), MemoryConnectionTable::new(), 3600).await;

    // Intent feed and EBT forwarder.
    assert_eq!(graph.subscriber_count().await, 2);

    h.handle.shutdown().await;
    assert_eq!(graph.subscriber_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_does_not_wait_forever_on_stuck_disconnect() {
    let (a, c) = (feed(1), feed(3));
    let graph = MemoryTrustGraph::new();
    let table = MemoryConnectionTable::new();
    table.insert(record(3, PeerState::Connected, PeerSource::Pub)).await;
    let recorder = RecordingTransport::new();

    let collab = Collaborators {
        graph: Arc::new(graph.clone()),
        announcements: Arc::new(MemoryAnnouncements::new(16)),
        table: Arc::new(StuckDisconnects(table.clone())),
        transport: Arc::new(recorder.clone()),
        ebt: Arc::new(recorder.clone()),
    };
    let mut opts = CoordinatorOptions::new(a.clone());
    opts.cleanup_grace = Duration::from_secs(1);
    let mut auth = AuthHook::new(Arc::new(AcceptAll));
    let mut history = HistoryHook::new(Arc::new(EmptyFeeds));
    let handle = Coordinator::start(opts, collab, &mut auth, &mut history).await;

    graph.set(a.clone(), c.clone(), Relation::Blocks).await;
    let watched = recorder.clone();
    eventually(|| {
        let recorder = watched.clone();
        let c = c.clone();
        async move { recorder.requests_for(&c).await == vec![false] }
    })
    .await;

    let stopped = tokio::time::timeout(Duration::from_secs(60), handle.shutdown()).await;
    assert!(stopped.is_ok(), "shutdown hung on the pending disconnect");
    // The abandoned cleanup never reached its removal.
    assert!(table.get(&c).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn fixture_replay_reports_policy_decisions() {
    let (a, b, c, d) = (feed(1), feed(2), feed(3), feed(4));
    let fixture = Fixture::from_json(
        &json!({
            "local": a.as_str(),
            "graph": { a.as_str(): { b.as_str(): true } },
            "peers": [{
                "address": { "key": c.as_str(), "host": "c.example", "port": 8008 },
                "state": "connected",
                "source": "stored"
            }],
            "feeds": {
                b.as_str(): [
                    { "author": b.as_str(), "sequence": 1, "content": { "type": "post", "text": "hi" } },
                    { "author": b.as_str(), "sequence": 2,
                      "content": { "type": "contact", "contact": d.as_str(), "blocking": true } },
                    { "author": b.as_str(), "sequence": 3, "content": { "type": "post", "text": "later" } }
                ]
            },
            "events": [
                { "kind": "graph", "delta": { a.as_str(): { c.as_str(): false } } },
                { "kind": "connect", "remote": c.as_str() },
                { "kind": "history", "caller": d.as_str(), "feed": b.as_str() },
                { "kind": "history", "caller": c.as_str(), "feed": b.as_str(), "keys": true },
                { "kind": "announce", "announcement": {
                    "author": b.as_str(),
                    "content": { "type": "pub", "address": { "key": d.as_str(), "host": "pub.example" } }
                } }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let config = WardenConfig::from_toml("discovery_delay_secs = 1").unwrap();
    let report = replay(fixture, a.clone(), &config).await;

    assert_eq!(report.local, a);
    assert!(report.requests.contains(&ReplicationRequest { feed: b.clone(), replicate: true }));
    assert!(report.requests.contains(&ReplicationRequest { feed: c.clone(), replicate: false }));
    assert!(report
        .ebt_blocks
        .contains(&EbtBlock { from: a.clone(), to: c.clone(), blocking: true }));

    assert_eq!(
        report.outcomes,
        vec![
            EventOutcome::Connect {
                remote: c.clone(),
                accepted: false,
                reason: Some("Unauthorized: client is blocked".to_string()),
            },
            EventOutcome::History { caller: d.clone(), feed: b.clone(), served: vec![1] },
            EventOutcome::History { caller: c.clone(), feed: b.clone(), served: vec![1, 2, 3] },
        ]
    );

    let keys: Vec<&FeedId> = report.peers.iter().map(|p| p.key()).collect();
    assert_eq!(keys, vec![&d]);
    assert_eq!(report.peers[0].source, PeerSource::Pub);
}

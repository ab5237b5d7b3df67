// crates/warden-daemon/src/fixture.rs
//
// Dry-run fixtures: a recorded starting state plus a sequence of events,
// replayed against in-memory collaborators so the policy decisions can be
// inspected without a network.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};

use warden_core::{
    AuthHook, AuthRequest, AuthResult, ConnectionTable, FeedId, GraphDelta, Handler, HistoryHook,
    HistoryOptions, HistoryRecord, HistoryRequest, HistoryResult, Message, PeerAddress, PeerRecord,
    PeerSource, PeerState, PubAnnouncement, TrustGraph, WardenError,
};
use warden_p2p::{
    DisconnectOpts, MemoryAnnouncements, MemoryConnectionTable, ReconcileReport, TableCommand,
};
use warden_sync::{EbtBlock, RecordingTransport, ReplicationRequest};
use warden_trust::MemoryTrustGraph;

use crate::config::WardenConfig;
use crate::coordinator::{Collaborators, Coordinator, CoordinatorOptions};

/// Pause after each event so background tasks can react before the next.
const SETTLE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Local identity, used when neither the CLI nor the config names one.
    #[serde(default)]
    pub local: Option<FeedId>,
    /// Trust graph at startup, as `{source: {dest: true|false|null}}`.
    #[serde(default)]
    pub graph: TrustGraph,
    /// Connection table at startup.
    #[serde(default)]
    pub peers: Vec<PeerRecord>,
    /// Stored feed messages served to legacy history requests.
    #[serde(default)]
    pub feeds: BTreeMap<FeedId, Vec<Message>>,
    #[serde(default)]
    pub events: Vec<FixtureEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixtureEvent {
    /// Apply a batch of edge changes to the trust graph.
    Graph { delta: GraphDelta },
    /// Publish a `pub` announcement.
    Announce { announcement: PubAnnouncement },
    /// Send a `Sync` marker to live announcement subscribers.
    Sync,
    /// An inbound connection attempt.
    Connect {
        remote: FeedId,
        #[serde(default)]
        host: Option<String>,
    },
    /// A legacy history-stream request.
    History {
        caller: FeedId,
        feed: FeedId,
        #[serde(default)]
        seq: u64,
        #[serde(default)]
        keys: bool,
    },
    /// Host-initiated disconnect.
    Disconnect { target: DisconnectOpts },
    /// Let time pass.
    Wait { millis: u64 },
}

impl Fixture {
    pub fn load(path: &str) -> Result<Self, WardenError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("{}: {}", path, e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, WardenError> {
        Ok(serde_json::from_str(contents)?)
    }
}

/// Result of one replayed event that produces an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventOutcome {
    Connect {
        remote: FeedId,
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    History {
        caller: FeedId,
        feed: FeedId,
        /// Sequence numbers of the records served.
        served: Vec<u64>,
    },
    Disconnect {
        disconnected: Option<FeedId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Everything the policy layer did during a replay.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub local: FeedId,
    pub reconciled: ReconcileReport,
    pub replicating: Vec<FeedId>,
    pub requests: Vec<ReplicationRequest>,
    pub ebt_blocks: Vec<EbtBlock>,
    pub table_commands: Vec<TableCommand>,
    pub peers: Vec<PeerRecord>,
    pub outcomes: Vec<EventOutcome>,
}

/// Accepts every connection that reaches the end of the auth chain.
struct AcceptAll;

#[async_trait]
impl Handler<AuthRequest, AuthResult> for AcceptAll {
    async fn call(&self, _req: AuthRequest) -> AuthResult {
        Ok(())
    }
}

/// Serves history from the fixture's stored feeds.
struct StoredFeeds {
    feeds: BTreeMap<FeedId, Vec<Message>>,
}

#[async_trait]
impl Handler<HistoryRequest, HistoryResult> for StoredFeeds {
    async fn call(&self, req: HistoryRequest) -> HistoryResult {
        let HistoryOptions { id, seq, keys, .. } = req.opts;
        let records: Vec<Result<HistoryRecord, WardenError>> = self
            .feeds
            .get(&id)
            .into_iter()
            .flatten()
            .filter(|msg| msg.sequence >= seq)
            .map(|msg| {
                let record = if keys {
                    HistoryRecord::Keyed {
                        key: format!("%{}:{}", msg.author, msg.sequence),
                        value: msg.clone(),
                    }
                } else {
                    HistoryRecord::Bare(msg.clone())
                };
                Ok(record)
            })
            .collect();
        Ok(stream::iter(records).boxed())
    }
}

/// Replay `fixture` as `local` and report what the policy layer did.
///
/// Waits out the discovery delay after the last event so announcements
/// are processed before the report is taken.
pub async fn replay(fixture: Fixture, local: FeedId, config: &WardenConfig) -> DryRunReport {
    let graph = MemoryTrustGraph::with_graph(fixture.graph).with_buffer(config.subscription_buffer);
    let announcements = MemoryAnnouncements::new(config.subscription_buffer);
    let table = MemoryConnectionTable::new();
    for peer in fixture.peers {
        table.insert(peer).await;
    }
    let recorder = RecordingTransport::new();

    let collab = Collaborators {
        graph: Arc::new(graph.clone()),
        announcements: Arc::new(announcements.clone()),
        table: Arc::new(table.clone()),
        transport: Arc::new(recorder.clone()),
        ebt: Arc::new(recorder.clone()),
    };
    let mut auth = AuthHook::new(Arc::new(AcceptAll));
    let mut history = HistoryHook::new(Arc::new(StoredFeeds { feeds: fixture.feeds }));

    let opts = CoordinatorOptions::from_config(local.clone(), config);
    let handle = Coordinator::start(opts, collab, &mut auth, &mut history).await;
    tokio::time::sleep(SETTLE).await;

    let mut outcomes = Vec::new();
    for event in fixture.events {
        match event {
            FixtureEvent::Graph { delta } => graph.apply(delta).await,
            FixtureEvent::Announce { announcement } => announcements.publish(announcement).await,
            FixtureEvent::Sync => announcements.mark_sync().await,
            FixtureEvent::Connect { remote, host } => {
                let result = auth.call(AuthRequest { remote: remote.clone() }).await;
                if result.is_ok() {
                    accept_connection(&table, &remote, host).await;
                }
                outcomes.push(EventOutcome::Connect {
                    remote,
                    accepted: result.is_ok(),
                    reason: result.err().map(|e| e.to_string()),
                });
            }
            FixtureEvent::History { caller, feed, seq, keys } => {
                let req = HistoryRequest {
                    caller: caller.clone(),
                    opts: HistoryOptions {
                        id: feed.clone(),
                        seq,
                        live: false,
                        keys,
                    },
                };
                let served: Vec<u64> = match history.call(req).await {
                    Ok(records) => {
                        records
                            .filter_map(|item| async move { item.ok() })
                            .map(|record| record.message().sequence)
                            .collect()
                            .await
                    }
                    Err(e) => {
                        tracing::warn!("History request for {} failed: {}", feed, e);
                        Vec::new()
                    }
                };
                outcomes.push(EventOutcome::History { caller, feed, served });
            }
            FixtureEvent::Disconnect { target } => {
                let outcome = match handle.disconnect(&target).await {
                    Ok(disconnected) => EventOutcome::Disconnect {
                        disconnected,
                        error: None,
                    },
                    Err(e) => EventOutcome::Disconnect {
                        disconnected: None,
                        error: Some(e.to_string()),
                    },
                };
                outcomes.push(outcome);
            }
            FixtureEvent::Wait { millis } => tokio::time::sleep(Duration::from_millis(millis)).await,
        }
        tokio::time::sleep(SETTLE).await;
    }

    tokio::time::sleep(config.discovery_delay() + SETTLE).await;

    let replicating = handle.replicating().members().await;
    let reconciled = handle.reconciled();
    handle.shutdown().await;

    let peers = table.list().await;
    DryRunReport {
        local,
        reconciled,
        replicating,
        requests: recorder.requests().await,
        ebt_blocks: recorder.blocks().await,
        table_commands: table.commands().await,
        peers,
        outcomes,
    }
}

/// Mark an accepted inbound peer as connected, adding it when the fixture
/// gave a host.
async fn accept_connection(table: &MemoryConnectionTable, remote: &FeedId, host: Option<String>) {
    if table.set_state(remote, PeerState::Connected).await {
        return;
    }
    let Some(host) = host else {
        return;
    };
    table
        .insert(PeerRecord {
            address: PeerAddress {
                key: remote.clone(),
                host,
                port: warden_core::message::DEFAULT_PORT,
            },
            state: PeerState::Connected,
            source: PeerSource::Manual,
        })
        .await;
}

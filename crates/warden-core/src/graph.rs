// crates/warden-core/src/graph.rs
//
// Trust graph snapshot and delta types.
//
// Each edge (source, dest) carries a tri-state relation: source follows
// dest, source blocks dest, or no opinion. Only follow and block edges are
// stored; a missing edge is neutral.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize, Serializer};

use crate::identity::FeedId;

/// Tri-state opinion one identity holds about another.
///
/// Serializes as `true` / `false` / `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Relation {
    Follows,
    Blocks,
    Neutral,
}

impl From<Option<bool>> for Relation {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Relation::Follows,
            Some(false) => Relation::Blocks,
            None => Relation::Neutral,
        }
    }
}

impl From<Relation> for Option<bool> {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::Follows => Some(true),
            Relation::Blocks => Some(false),
            Relation::Neutral => None,
        }
    }
}

/// Point-in-time snapshot of the trust relation.
///
/// Owned by the trust graph source; the policy layer only ever reads a
/// shared `Arc<TrustGraph>`.
///
/// Deserializes from the same `{source: {dest: true|false|null}}` map as
/// a [`GraphDelta`], so `null` entries are dropped rather than stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "GraphDelta")]
pub struct TrustGraph {
    edges: HashMap<FeedId, HashMap<FeedId, Relation>>,
}

impl TrustGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relation from `source` to `dest`; `Neutral` if no edge exists.
    pub fn get(&self, source: &FeedId, dest: &FeedId) -> Relation {
        self.edges
            .get(source)
            .and_then(|out| out.get(dest))
            .copied()
            .unwrap_or(Relation::Neutral)
    }

    /// Set (or clear, for `Neutral`) the edge from `source` to `dest`.
    pub fn set(&mut self, source: FeedId, dest: FeedId, relation: Relation) {
        match relation {
            Relation::Neutral => {
                if let Some(out) = self.edges.get_mut(&source) {
                    out.remove(&dest);
                    if out.is_empty() {
                        self.edges.remove(&source);
                    }
                }
            }
            _ => {
                self.edges.entry(source).or_default().insert(dest, relation);
            }
        }
    }

    pub fn is_blocking(&self, source: &FeedId, dest: &FeedId) -> bool {
        self.get(source, dest) == Relation::Blocks
    }

    pub fn is_following(&self, source: &FeedId, dest: &FeedId) -> bool {
        self.get(source, dest) == Relation::Follows
    }

    /// Outgoing non-neutral edges of `source`.
    pub fn outgoing<'a>(
        &'a self,
        source: &FeedId,
    ) -> impl Iterator<Item = (&'a FeedId, Relation)> + 'a {
        self.edges
            .get(source)
            .into_iter()
            .flat_map(|out| out.iter().map(|(dest, rel)| (dest, *rel)))
    }

    /// Apply every edge of a delta, in order.
    pub fn apply(&mut self, delta: &GraphDelta) {
        for (source, dest, relation) in delta.edges() {
            self.set(source.clone(), dest.clone(), relation);
        }
    }

    /// Number of stored (non-neutral) edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashMap::len).sum()
    }
}

impl From<GraphDelta> for TrustGraph {
    fn from(delta: GraphDelta) -> Self {
        let mut graph = TrustGraph::new();
        graph.apply(&delta);
        graph
    }
}

impl Serialize for TrustGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.edges.serialize(serializer)
    }
}

/// A batch of edge changes, grouped by source identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphDelta {
    changes: BTreeMap<FeedId, BTreeMap<FeedId, Relation>>,
}

impl GraphDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a single edge change.
    pub fn with(mut self, source: FeedId, dest: FeedId, relation: Relation) -> Self {
        self.insert(source, dest, relation);
        self
    }

    pub fn insert(&mut self, source: FeedId, dest: FeedId, relation: Relation) {
        self.changes.entry(source).or_default().insert(dest, relation);
    }

    /// Iterate `(source, dest, relation)` triples in source, then dest order.
    pub fn edges(&self) -> impl Iterator<Item = (&FeedId, &FeedId, Relation)> + '_ {
        self.changes
            .iter()
            .flat_map(|(source, out)| out.iter().map(move |(dest, rel)| (source, dest, *rel)))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.values().all(BTreeMap::is_empty)
    }
}

// crates/warden-core/src/intent.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::Relation;
use crate::identity::FeedId;

/// Whether the local node should actively fetch a remote feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum ReplicationIntent {
    /// Replicate the feed (`true`).
    Replicate,
    /// The local identity blocks the feed (`false`).
    Unreplicate,
    /// Out of range or no opinion (absent).
    Unknown,
}

impl ReplicationIntent {
    pub fn should_replicate(self) -> bool {
        self == ReplicationIntent::Replicate
    }

    pub fn is_blocked(self) -> bool {
        self == ReplicationIntent::Unreplicate
    }
}

impl From<Relation> for ReplicationIntent {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::Follows => ReplicationIntent::Replicate,
            Relation::Blocks => ReplicationIntent::Unreplicate,
            Relation::Neutral => ReplicationIntent::Unknown,
        }
    }
}

impl From<Option<bool>> for ReplicationIntent {
    fn from(value: Option<bool>) -> Self {
        Relation::from(value).into()
    }
}

impl From<ReplicationIntent> for Option<bool> {
    fn from(intent: ReplicationIntent) -> Self {
        match intent {
            ReplicationIntent::Replicate => Some(true),
            ReplicationIntent::Unreplicate => Some(false),
            ReplicationIntent::Unknown => None,
        }
    }
}

/// Feeds whose intent changed, with their new intent.
pub type IntentBatch = BTreeMap<FeedId, ReplicationIntent>;

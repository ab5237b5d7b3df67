// crates/warden-core/src/message.rs
//
// Feed message shapes the policy layer inspects: legacy history-stream
// records and `pub` announcements. Content stays as raw JSON; typed views
// are parsed on demand and anything malformed yields `None`.

use serde::{Deserialize, Serialize};

use crate::identity::FeedId;
use crate::peer::PeerAddress;

/// Default port assumed when a pub address omits one.
pub const DEFAULT_PORT: u16 = 8008;

/// A message value as stored in a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub author: FeedId,
    pub sequence: u64,
    /// Message content. Encrypted messages carry a string here.
    pub content: serde_json::Value,
}

/// A `contact` message: follow, unfollow, or block assertion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub contact: Option<String>,
    pub following: Option<bool>,
    pub blocking: Option<bool>,
}

impl Message {
    /// Content type string, if the content is a plaintext object.
    pub fn content_type(&self) -> Option<&str> {
        self.content.get("type").and_then(serde_json::Value::as_str)
    }

    /// Parse the content as a contact message.
    pub fn as_contact(&self) -> Option<ContactContent> {
        if self.content_type() != Some("contact") {
            return None;
        }
        ContactContent::deserialize(&self.content).ok()
    }

    /// Returns `true` if this message asserts that its author blocks `peer`.
    pub fn asserts_block_of(&self, peer: &FeedId) -> bool {
        self.as_contact().is_some_and(|contact| {
            contact.blocking == Some(true) && contact.contact.as_deref() == Some(peer.as_str())
        })
    }
}

/// One item of a legacy history stream.
///
/// Requests made with `keys: true` yield the keyed wrapper, otherwise the
/// bare message value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryRecord {
    Keyed { key: String, value: Message },
    Bare(Message),
}

impl HistoryRecord {
    pub fn message(&self) -> &Message {
        match self {
            HistoryRecord::Keyed { value, .. } => value,
            HistoryRecord::Bare(message) => message,
        }
    }
}

/// A `pub` message announcing a rendezvous peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubAnnouncement {
    pub author: FeedId,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PubContent {
    address: Option<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    key: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

impl PubAnnouncement {
    /// The announced address, or `None` if the payload is missing or the
    /// key is not a well-formed feed identity. A missing host is left empty
    /// for the connection layer to resolve.
    pub fn address(&self) -> Option<PeerAddress> {
        let content = self.content.as_ref()?;
        let raw = PubContent::deserialize(content).ok()?.address?;
        let key = FeedId::parse(raw.key.as_deref()?).ok()?;
        Some(PeerAddress {
            key,
            host: raw.host.unwrap_or_default(),
            port: raw.port.unwrap_or(DEFAULT_PORT),
        })
    }
}

/// An item of the live announcement stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnouncementEvent {
    /// A pub announcement.
    Pub(PubAnnouncement),
    /// The stream has caught up with its backlog.
    Sync,
}

// crates/warden-core/src/identity.rs
//
// Feed identities: `@<base64 ed25519 public key>.ed25519`.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WardenError;

const SIGIL: &str = "@";
const SUFFIX: &str = ".ed25519";

/// Identity of a feed (and of the peer that owns it).
///
/// Construction always validates: the payload must decode to 32 bytes that
/// form a valid ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedId(String);

impl FeedId {
    /// Parse and validate a feed identity string.
    pub fn parse(s: &str) -> Result<Self, WardenError> {
        let body = s
            .strip_prefix(SIGIL)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .ok_or_else(|| WardenError::InvalidFeedId(s.to_string()))?;

        let bytes = STANDARD
            .decode(body)
            .map_err(|e| WardenError::InvalidFeedId(format!("{}: {}", s, e)))?;

        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            WardenError::InvalidFeedId(format!("{}: expected 32 key bytes, got {}", s, bytes.len()))
        })?;

        VerifyingKey::from_bytes(&key)
            .map_err(|e| WardenError::InvalidFeedId(format!("{}: {}", s, e)))?;

        Ok(Self(s.to_string()))
    }

    /// Returns `true` if `s` is a well-formed feed identity.
    pub fn is_feed(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// Build the identity for an ed25519 public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Self(format!("{}{}{}", SIGIL, STANDARD.encode(key.as_bytes()), SUFFIX))
    }

    /// Derive the identity belonging to a 32-byte signing seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_public_key(&SigningKey::from_bytes(seed).verifying_key())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeedId {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FeedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FeedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FeedId::parse(&s).map_err(serde::de::Error::custom)
    }
}

// crates/warden-daemon/src/identity.rs
//
// Local identity resolution for the daemon.

use std::fs;

use warden_core::{FeedId, WardenError};

use crate::config::WardenConfig;
use crate::fixture::Fixture;

/// Pick the local identity: explicit id from CLI or config, then the
/// fixture's, then the secret seed file at `identity_path`.
pub fn resolve_local_id(config: &WardenConfig, fixture: &Fixture) -> Result<FeedId, WardenError> {
    if let Some(id) = &config.local_id {
        return FeedId::parse(id);
    }
    if let Some(id) = &fixture.local {
        return Ok(id.clone());
    }
    load_seed(&expand_tilde(&config.identity_path))
}

/// Derive the identity from a hex-encoded 32-byte ed25519 seed file.
pub fn load_seed(path: &str) -> Result<FeedId, WardenError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        WardenError::Config(format!("no local identity given and {} unreadable: {}", path, e))
    })?;

    let mut seed = [0u8; 32];
    hex::decode_to_slice(contents.trim(), &mut seed)
        .map_err(|e| WardenError::Config(format!("Invalid identity seed at {}: {}", path, e)))?;
    Ok(FeedId::from_seed(&seed))
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

// crates/warden-daemon/src/config.rs
//
// Runtime configuration for the Warden daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;
use std::time::Duration;

use warden_core::WardenError;
use warden_p2p::DiscoveryConfig;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct WardenConfig {
    /// Local feed identity (`@<base64>.ed25519`). When unset the identity
    /// is derived from the secret seed at `identity_path`.
    #[serde(default)]
    pub local_id: Option<String>,

    /// Hex-encoded 32-byte ed25519 seed for the local identity.
    #[serde(default = "default_identity_path")]
    pub identity_path: String,

    /// Maximum follow distance at which feeds are replicated.
    #[serde(default = "default_hops")]
    pub hops: u32,

    /// Seconds to wait after startup before consuming pub announcements.
    #[serde(default = "default_discovery_delay_secs")]
    pub discovery_delay_secs: u64,

    /// Gossip (connection table) settings.
    #[serde(default)]
    pub gossip: GossipConfig,

    /// Seconds shutdown waits for in-flight disconnects of blocked peers.
    #[serde(default = "default_cleanup_grace_secs")]
    pub cleanup_grace_secs: u64,

    /// Capacity of each internal subscription channel.
    #[serde(default = "default_subscription_buffer")]
    pub subscription_buffer: usize,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GossipConfig {
    /// Remove pub peers whose announcers are no longer replicated.
    #[serde(default)]
    pub prune: bool,
}

fn default_identity_path() -> String {
    "~/.warden/secret.hex".to_string()
}

fn default_hops() -> u32 {
    warden_trust::DEFAULT_HOPS
}

fn default_discovery_delay_secs() -> u64 {
    warden_p2p::DEFAULT_DISCOVERY_DELAY.as_secs()
}

fn default_cleanup_grace_secs() -> u64 {
    warden_sync::DEFAULT_CLEANUP_GRACE.as_secs()
}

fn default_subscription_buffer() -> usize {
    warden_trust::DEFAULT_BUFFER
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            local_id: None,
            identity_path: default_identity_path(),
            hops: default_hops(),
            discovery_delay_secs: default_discovery_delay_secs(),
            gossip: GossipConfig::default(),
            cleanup_grace_secs: default_cleanup_grace_secs(),
            subscription_buffer: default_subscription_buffer(),
            log_level: default_log_level(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, WardenError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("{}: {}", path, e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, WardenError> {
        let config: WardenConfig =
            toml::from_str(contents).map_err(|e| WardenError::Config(e.to_string()))?;
        if config.subscription_buffer == 0 {
            return Err(WardenError::Config("subscription_buffer must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            delay_secs: self.discovery_delay_secs,
            prune: self.gossip.prune,
        }
    }

    pub fn discovery_delay(&self) -> Duration {
        Duration::from_secs(self.discovery_delay_secs)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = WardenConfig::from_toml("").unwrap();
        assert_eq!(config.hops, 2);
        assert_eq!(config.discovery_delay_secs, 10);
        assert!(!config.gossip.prune);
        assert_eq!(config.subscription_buffer, 64);
        assert_eq!(config.cleanup_grace(), Duration::from_secs(5));
        assert_eq!(config.log_level, "info");
        assert!(config.local_id.is_none());
    }

    #[test]
    fn overrides_nested_gossip_section() {
        let config = WardenConfig::from_toml(
            r#"
            hops = 3
            discovery_delay_secs = 0

            [gossip]
            prune = true
            "#,
        )
        .unwrap();
        assert_eq!(config.hops, 3);
        assert_eq!(config.discovery_delay(), Duration::ZERO);
        assert!(config.discovery().prune);
    }

    #[test]
    fn rejects_zero_buffer() {
        let err = WardenConfig::from_toml("subscription_buffer = 0").unwrap_err();
        assert!(matches!(err, WardenError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = WardenConfig::load("/nonexistent/warden.toml").unwrap_err();
        assert!(matches!(err, WardenError::Config(_)));
    }
}

use thiserror::Error;

/// Error type shared by every Warden crate.
#[derive(Debug, Error)]
pub enum WardenError {
    /// The trust graph could not be read (snapshot or blocking lookup).
    #[error("Graph read error: {0}")]
    GraphRead(String),

    /// Connection-table or transport failure (add, remove, disconnect).
    #[error("Network error: {0}")]
    Network(String),

    /// An inbound connection was refused by policy.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The replication transport or EBT layer rejected a command.
    #[error("Replication error: {0}")]
    Replication(String),

    /// A string is not a well-formed feed identity.
    #[error("Invalid feed id: {0}")]
    InvalidFeedId(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Resource not found (e.g. a peer missing from the connection table).
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for WardenError {
    fn from(e: serde_json::Error) -> Self {
        WardenError::Serialization(e.to_string())
    }
}

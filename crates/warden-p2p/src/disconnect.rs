// crates/warden-p2p/src/disconnect.rs
//
// Host-facing `disconnect`: drop the connection to a peer identified by
// feed id or by host.

use serde::{Deserialize, Serialize};

use warden_core::{ConnectionTable, FeedId, WardenError};

/// Which peer to disconnect. Either field may match.
///
/// Deserializes from a bare string (treated as a key when it is a
/// well-formed feed id, ignored otherwise) or from `{key?, host?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DisconnectArg")]
pub struct DisconnectOpts {
    pub key: Option<String>,
    pub host: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DisconnectArg {
    Bare(String),
    Opts {
        key: Option<String>,
        host: Option<String>,
    },
}

impl From<DisconnectArg> for DisconnectOpts {
    fn from(arg: DisconnectArg) -> Self {
        match arg {
            DisconnectArg::Bare(s) if FeedId::is_feed(&s) => Self {
                key: Some(s),
                host: None,
            },
            DisconnectArg::Bare(_) => Self::default(),
            DisconnectArg::Opts { key, host } => Self { key, host },
        }
    }
}

impl From<FeedId> for DisconnectOpts {
    fn from(key: FeedId) -> Self {
        Self {
            key: Some(key.as_str().to_string()),
            host: None,
        }
    }
}

impl DisconnectOpts {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            key: None,
            host: Some(host.into()),
        }
    }

    fn is_empty(&self) -> bool {
        self.key.is_none() && self.host.is_none()
    }
}

/// Disconnect the first connected peer matching `opts`.
///
/// Returns the identity of the disconnected peer, or `None` when nothing
/// matched. A disconnect failure is returned to the caller.
pub async fn disconnect(
    table: &dyn ConnectionTable,
    opts: &DisconnectOpts,
) -> Result<Option<FeedId>, WardenError> {
    if opts.is_empty() {
        return Ok(None);
    }

    let target = table.list().await.into_iter().find(|peer| {
        peer.is_connected()
            && (opts.key.as_deref() == Some(peer.key().as_str())
                || opts.host.as_deref() == Some(peer.host()))
    });

    let Some(peer) = target else {
        tracing::debug!("Disconnect: no connected peer matches {:?}", opts);
        return Ok(None);
    };

    table.disconnect(peer.key()).await?;
    tracing::info!("Disconnected peer {} ({})", peer.key(), peer.host());
    Ok(Some(peer.address.key))
}

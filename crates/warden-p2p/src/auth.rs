// crates/warden-p2p/src/auth.rs
//
// Block-aware authorization: refuse inbound connections from peers the
// local identity blocks.

use std::sync::Arc;

use async_trait::async_trait;

use warden_core::{
    AuthRequest, AuthResult, FeedId, Interceptor, Next, TrustGraphSource, WardenError,
};

/// Auth interceptor that rejects blocked remotes.
///
/// One blocking lookup per attempt. A failed lookup lets the attempt
/// through: a transient graph read error must not lock peers out.
pub struct BlockGate {
    local: FeedId,
    graph: Arc<dyn TrustGraphSource>,
}

impl BlockGate {
    pub fn new(local: FeedId, graph: Arc<dyn TrustGraphSource>) -> Self {
        Self { local, graph }
    }
}

#[async_trait]
impl Interceptor<AuthRequest, AuthResult> for BlockGate {
    async fn intercept(&self, req: AuthRequest, next: Next<'_, AuthRequest, AuthResult>) -> AuthResult {
        match self.graph.is_blocking(&self.local, &req.remote).await {
            Ok(true) => {
                tracing::info!("Refusing connection from blocked peer {}", req.remote);
                Err(WardenError::Unauthorized("client is blocked".to_string()))
            }
            Ok(false) => next.run(req).await,
            Err(e) => {
                tracing::debug!("Block lookup for {} failed, allowing connection: {}", req.remote, e);
                next.run(req).await
            }
        }
    }
}

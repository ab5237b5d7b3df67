// crates/warden-sync/src/history.rs
//
// Legacy replication guard: keep a feed's history away from peers the
// feed's author blocks.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{future, stream, StreamExt};

use warden_core::{
    FeedId, HistoryRequest, HistoryResult, HistoryStream, Interceptor, Next, TrustGraphSource,
};

/// History-stream interceptor.
///
/// If the requested feed blocks the caller the request gets an empty
/// stream: no error, nothing to tell the caller it was refused. Otherwise
/// the stream from the rest of the chain is served up to (not including)
/// the first record in which the feed asserts a block of the caller.
///
/// A graph read error serves the stream with only the cutoff applied.
pub struct LegacyGuard {
    graph: Arc<dyn TrustGraphSource>,
}

impl LegacyGuard {
    pub fn new(graph: Arc<dyn TrustGraphSource>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Interceptor<HistoryRequest, HistoryResult> for LegacyGuard {
    async fn intercept(
        &self,
        req: HistoryRequest,
        next: Next<'_, HistoryRequest, HistoryResult>,
    ) -> HistoryResult {
        let caller = req.caller.clone();
        let feed = req.opts.id.clone();

        if feed != caller {
            match self.graph.snapshot().await {
                Ok(graph) if graph.is_blocking(&feed, &caller) => {
                    tracing::debug!("Withholding history of {} from blocked peer {}", feed, caller);
                    return Ok(stream::empty().boxed());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Block lookup for history request failed, serving: {}", e);
                }
            }
        }

        let served = next.run(req).await?;
        Ok(cut_off_at_block(served, caller))
    }
}

/// End `served` just before the first record that blocks `caller`.
pub fn cut_off_at_block(served: HistoryStream, caller: FeedId) -> HistoryStream {
    served
        .take_while(move |item| {
            let keep = match item {
                Ok(record) => !record.message().asserts_block_of(&caller),
                Err(_) => true,
            };
            future::ready(keep)
        })
        .boxed()
}

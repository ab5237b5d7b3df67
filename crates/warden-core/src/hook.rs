// crates/warden-core/src/hook.rs
//
// Interceptor chains for host operations (connection auth, legacy history
// streams).
//
// A `Hook` holds a terminal handler plus an ordered list of interceptors.
// Calling the hook runs the interceptors in registration order; each one
// receives a `Next` continuation and either calls it to continue down the
// chain or returns its own response to short-circuit.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::WardenError;
use crate::identity::FeedId;
use crate::message::HistoryRecord;

/// The operation at the end of a hook chain.
#[async_trait]
pub trait Handler<Req, Resp>: Send + Sync {
    async fn call(&self, req: Req) -> Resp;
}

/// A link in a hook chain.
#[async_trait]
pub trait Interceptor<Req, Resp>: Send + Sync {
    async fn intercept(&self, req: Req, next: Next<'_, Req, Resp>) -> Resp;
}

/// Continuation handed to an interceptor: the rest of the chain.
pub struct Next<'a, Req, Resp> {
    interceptors: &'a [Arc<dyn Interceptor<Req, Resp>>],
    terminal: &'a dyn Handler<Req, Resp>,
}

impl<'a, Req, Resp> Next<'a, Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Continue with the remaining interceptors and then the terminal handler.
    pub async fn run(self, req: Req) -> Resp {
        match self.interceptors.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    interceptors: rest,
                    terminal: self.terminal,
                };
                head.intercept(req, next).await
            }
            None => self.terminal.call(req).await,
        }
    }
}

/// A terminal handler wrapped by an ordered interceptor list.
pub struct Hook<Req, Resp> {
    interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>,
    terminal: Arc<dyn Handler<Req, Resp>>,
}

impl<Req, Resp> Hook<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(terminal: Arc<dyn Handler<Req, Resp>>) -> Self {
        Self {
            interceptors: Vec::new(),
            terminal,
        }
    }

    /// Append an interceptor. Earlier registrations run first.
    pub fn register(&mut self, interceptor: Arc<dyn Interceptor<Req, Resp>>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain for one request.
    pub async fn call(&self, req: Req) -> Resp {
        Next {
            interceptors: &self.interceptors,
            terminal: self.terminal.as_ref(),
        }
        .run(req)
        .await
    }
}

/// An inbound connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Identity of the connecting peer.
    pub remote: FeedId,
}

pub type AuthResult = Result<(), WardenError>;

/// Hook over connection authorization.
pub type AuthHook = Hook<AuthRequest, AuthResult>;

/// Options of a legacy history-stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOptions {
    /// The feed whose history is requested.
    pub id: FeedId,
    /// First sequence number to send.
    pub seq: u64,
    /// Keep the stream open for new messages.
    pub live: bool,
    /// Wrap each message as `{key, value}`.
    pub keys: bool,
}

/// A legacy history-stream request from a connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Identity of the requesting peer.
    pub caller: FeedId,
    pub opts: HistoryOptions,
}

/// Records served for a history request. Dropping the stream cancels it.
pub type HistoryStream = BoxStream<'static, Result<HistoryRecord, WardenError>>;

pub type HistoryResult = Result<HistoryStream, WardenError>;

/// Hook over legacy history-stream serving.
pub type HistoryHook = Hook<HistoryRequest, HistoryResult>;

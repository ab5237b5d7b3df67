// crates/warden-core/src/subscription.rs
//
// Live subscriptions: an ordered sequence of items delivered over a bounded
// channel. The publisher awaits capacity, so a slow consumer slows the
// publisher down instead of growing a buffer.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

/// Publishing half of a subscription.
pub type Publisher<T> = mpsc::Sender<T>;

/// Receiving half of a live subscription.
///
/// Dropping it or calling [`Subscription::unsubscribe`] tells the publisher
/// to stop delivering.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Create a connected publisher/subscription pair with `buffer` slots.
    pub fn channel(buffer: usize) -> (Publisher<T>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Wait for the next item. `None` once the publisher has gone away.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop receiving. Items already buffered are discarded.
    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

// crates/warden-p2p/src/announce.rs
//
// In-memory source of `pub` announcements.
//
// A new subscriber first receives the stored backlog, then a `Sync`
// marker, then announcements published afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use warden_core::{AnnouncementEvent, AnnouncementSource, Publisher, PubAnnouncement, Subscription};

#[derive(Debug, Default)]
struct Inner {
    backlog: Vec<PubAnnouncement>,
    subscribers: Vec<Publisher<AnnouncementEvent>>,
}

#[derive(Debug, Clone)]
pub struct MemoryAnnouncements {
    inner: Arc<Mutex<Inner>>,
    buffer: usize,
}

impl MemoryAnnouncements {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            buffer,
        }
    }

    /// Store an announcement and deliver it to live subscribers.
    pub async fn publish(&self, announcement: PubAnnouncement) {
        let mut inner = self.inner.lock().await;
        inner.backlog.push(announcement.clone());
        broadcast(&mut inner.subscribers, AnnouncementEvent::Pub(announcement)).await;
    }

    /// Send an extra `Sync` marker to live subscribers.
    pub async fn mark_sync(&self) {
        let mut inner = self.inner.lock().await;
        broadcast(&mut inner.subscribers, AnnouncementEvent::Sync).await;
    }
}

async fn broadcast(subscribers: &mut Vec<Publisher<AnnouncementEvent>>, event: AnnouncementEvent) {
    let mut live = Vec::with_capacity(subscribers.len());
    for tx in subscribers.drain(..) {
        if tx.send(event.clone()).await.is_ok() {
            live.push(tx);
        }
    }
    *subscribers = live;
}

#[async_trait]
impl AnnouncementSource for MemoryAnnouncements {
    async fn pub_announcements(&self) -> Subscription<AnnouncementEvent> {
        let (tx, sub) = Subscription::channel(self.buffer);
        let inner = self.inner.clone();

        // Replay in a task so a backlog larger than the buffer does not
        // block the caller before it starts reading.
        tokio::spawn(async move {
            let mut inner = inner.lock().await;
            for announcement in inner.backlog.clone() {
                if tx.send(AnnouncementEvent::Pub(announcement)).await.is_err() {
                    return;
                }
            }
            if tx.send(AnnouncementEvent::Sync).await.is_ok() {
                inner.subscribers.push(tx);
            }
        });

        sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::FeedId;

    fn announcement(seed: u8) -> PubAnnouncement {
        PubAnnouncement {
            author: FeedId::from_seed(&[seed; 32]),
            content: None,
        }
    }

    #[tokio::test]
    async fn backlog_then_sync_then_live() {
        let source = MemoryAnnouncements::new(1);
        source.publish(announcement(1)).await;
        source.publish(announcement(2)).await;

        let mut sub = source.pub_announcements().await;
        assert_eq!(sub.next().await, Some(AnnouncementEvent::Pub(announcement(1))));
        assert_eq!(sub.next().await, Some(AnnouncementEvent::Pub(announcement(2))));
        assert_eq!(sub.next().await, Some(AnnouncementEvent::Sync));

        let publisher = source.clone();
        let live = tokio::spawn(async move { publisher.publish(announcement(3)).await });
        assert_eq!(sub.next().await, Some(AnnouncementEvent::Pub(announcement(3))));
        live.await.unwrap();
    }
}

//! Bounded per-subscriber queue with drop-oldest backpressure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::HubMessage;

/// A single subscriber's mailbox. `push` never blocks: once full, the
/// oldest queued message is dropped to make room and the drop counter is
/// incremented. `recv` is the only suspension point.
pub(crate) struct SubscriberQueue {
    capacity: usize,
    inner: Mutex<VecDeque<HubMessage>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: Mutex<bool>,
}

impl SubscriberQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: Mutex::new(false),
        }
    }

    pub(crate) fn push(&self, message: HubMessage) {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            inner.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        inner.push_back(message);
        drop(inner);
        self.notify.notify_one();
    }

    pub(crate) async fn recv(&self) -> Option<HubMessage> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(msg) = inner.pop_front() {
                    return Some(msg);
                }
                if *self.closed.lock() {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn close(&self) {
        *self.closed.lock() = true;
        self.notify.notify_one();
    }

    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Payload;

    fn msg(seq: u64) -> HubMessage {
        HubMessage {
            topic: "t".into(),
            seq,
            payload: Payload::Event(serde_json::json!({ "seq": seq })),
        }
    }

    #[tokio::test]
    async fn push_past_capacity_drops_oldest() {
        let q = SubscriberQueue::new(2);
        q.push(msg(1));
        q.push(msg(2));
        q.push(msg(3));
        assert_eq!(q.dropped_count(), 1);

        assert_eq!(q.recv().await.unwrap().seq, 2);
        assert_eq!(q.recv().await.unwrap().seq, 3);
    }

    #[tokio::test]
    async fn close_unblocks_a_pending_recv() {
        let q = SubscriberQueue::new(2);
        q.close();
        assert!(q.recv().await.is_none());
    }
}

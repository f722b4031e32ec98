//! Topic-keyed broadcaster (C9).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::queue::SubscriberQueue;

/// What kind of messages a subscription wants to receive on its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Frames,
    Events,
    Both,
}

impl SubscriptionKind {
    fn accepts(self, payload: &Payload) -> bool {
        match (self, payload) {
            (SubscriptionKind::Both, _) => true,
            (SubscriptionKind::Frames, Payload::Frame(_)) => true,
            (SubscriptionKind::Events, Payload::Event(_)) => true,
            _ => false,
        }
    }
}

/// The body of one published message.
#[derive(Debug)]
pub enum Payload {
    /// A raw frame, e.g. a JPEG-encoded camera image.
    Frame(Vec<u8>),
    /// A structured event (`RecognitionEvent`, `PresenceDelta`,
    /// `WorkerStatus`, ...), carried as JSON so this crate stays
    /// independent of any one event type.
    Event(serde_json::Value),
}

/// One delivered message, stamped with its topic and the topic's
/// monotonically increasing sequence number at publish time.
#[derive(Debug, Clone)]
pub struct HubMessage {
    pub topic: String,
    pub seq: u64,
    pub payload: Payload,
}

struct TopicState {
    next_seq: u64,
    subscribers: HashMap<u64, (SubscriptionKind, Arc<SubscriberQueue>)>,
}

impl TopicState {
    fn new() -> Self {
        Self {
            next_seq: 0,
            subscribers: HashMap::new(),
        }
    }
}

/// The subscription hub. Construct with [`Hub::new`] and keep it behind
/// an `Arc` — `subscribe` takes `&Arc<Self>` so a [`Subscription`] can
/// hold a [`Weak`] back-reference without keeping the hub alive past the
/// application root that owns it.
pub struct Hub {
    queue_capacity: usize,
    topics: Mutex<HashMap<String, TopicState>>,
    next_sub_id: AtomicU64,
}

impl Hub {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue_capacity,
            topics: Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(1),
        })
    }

    /// Subscribe to a topic. The subscription is live immediately;
    /// messages published before this call are not replayed.
    pub fn subscribe(self: &Arc<Self>, topic: impl Into<String>, kind: SubscriptionKind) -> Subscription {
        let topic = topic.into();
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(self.queue_capacity));

        let mut topics = self.topics.lock();
        topics
            .entry(topic.clone())
            .or_insert_with(TopicState::new)
            .subscribers
            .insert(id, (kind, queue.clone()));
        drop(topics);

        Subscription {
            hub: Arc::downgrade(self),
            topic,
            id,
            queue,
        }
    }

    /// Deliver `payload` to every live subscriber of `topic` whose kind
    /// accepts it. Never blocks: a full subscriber queue drops its
    /// oldest entry instead of backing up the publisher.
    pub fn publish(&self, topic: &str, payload: Payload) -> u64 {
        let mut topics = self.topics.lock();
        let state = topics.entry(topic.to_string()).or_insert_with(TopicState::new);
        let seq = state.next_seq;
        state.next_seq += 1;

        for (kind, queue) in state.subscribers.values() {
            if kind.accepts(&payload) {
                queue.push(HubMessage {
                    topic: topic.to_string(),
                    seq,
                    payload: payload.clone(),
                });
            }
        }
        seq
    }

    /// Number of live subscribers across all topics (diagnostics).
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|t| t.subscribers.len())
            .unwrap_or(0)
    }

    fn remove(&self, topic: &str, id: u64) {
        let mut topics = self.topics.lock();
        if let Some(state) = topics.get_mut(topic) {
            if let Some((_, queue)) = state.subscribers.remove(&id) {
                queue.close();
            }
            if state.subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl Clone for Payload {
    fn clone(&self) -> Self {
        match self {
            Payload::Frame(bytes) => Payload::Frame(bytes.clone()),
            Payload::Event(value) => Payload::Event(value.clone()),
        }
    }
}

/// A live subscription. Dropping it unsubscribes; [`Subscription::unsubscribe`]
/// does the same thing explicitly and is idempotent either way, since
/// removing an already-removed subscriber id from the topic map is a
/// no-op.
pub struct Subscription {
    hub: Weak<Hub>,
    topic: String,
    id: u64,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message. Returns `None` once the subscription
    /// has been removed from the hub.
    pub async fn recv(&self) -> Option<HubMessage> {
        self.queue.recv().await
    }

    /// Messages dropped from this subscriber's queue due to backpressure.
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }

    /// Explicitly unsubscribe. Safe to call more than once and safe to
    /// skip — `Drop` does the same cleanup.
    pub fn unsubscribe(self) {
        // Drop impl performs the removal; this method exists so callers
        // can express the intent explicitly without relying on scope end.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.topic, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let hub = Hub::new(8);
        let sub = hub.subscribe("camera:1", SubscriptionKind::Events);
        hub.publish("camera:1", Payload::Event(serde_json::json!({"a": 1})));

        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.seq, 0);
        assert!(matches!(msg.payload, Payload::Event(_)));
    }

    #[tokio::test]
    async fn frames_only_subscriber_does_not_see_events() {
        let hub = Hub::new(8);
        let sub = hub.subscribe("camera:1", SubscriptionKind::Frames);
        hub.publish("camera:1", Payload::Event(serde_json::json!({})));
        hub.publish("camera:1", Payload::Frame(vec![1, 2, 3]));

        let msg = sub.recv().await.unwrap();
        assert!(matches!(msg.payload, Payload::Frame(_)));
    }

    #[tokio::test]
    async fn sequence_numbers_increase_monotonically_per_topic() {
        let hub = Hub::new(8);
        let seq0 = hub.publish("room:1", Payload::Event(serde_json::json!({})));
        let seq1 = hub.publish("room:1", Payload::Event(serde_json::json!({})));
        assert_eq!(seq0, 0);
        assert_eq!(seq1, 1);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest_and_publish_never_blocks() {
        let hub = Hub::new(2);
        let sub = hub.subscribe("camera:1", SubscriptionKind::Events);
        for i in 0..5 {
            hub.publish("camera:1", Payload::Event(serde_json::json!({ "i": i })));
        }
        assert!(sub.dropped_count() >= 3);
    }

    #[tokio::test]
    async fn two_subscribers_on_one_topic_are_isolated() {
        let hub = Hub::new(8);
        let a = hub.subscribe("room:1", SubscriptionKind::Events);
        let b = hub.subscribe("room:1", SubscriptionKind::Events);
        hub.publish("room:1", Payload::Event(serde_json::json!({})));

        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
        drop(a);
        hub.publish("room:1", Payload::Event(serde_json::json!({})));
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_leak_free() {
        let hub = Hub::new(8);
        let sub = hub.subscribe("room:1", SubscriptionKind::Events);
        assert_eq!(hub.subscriber_count("room:1"), 1);
        sub.unsubscribe();
        assert_eq!(hub.subscriber_count("room:1"), 0);
    }
}

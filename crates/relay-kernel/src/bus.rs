//! The in-process message broker.
//!
//! A process-wide pub/sub: subscribers register on topic patterns
//! (`agent.*`-style globs); `publish` fans out to every matching
//! subscriber. Delivery is best-effort and in-process only — there is no
//! persistence and no backpressure beyond each subscriber's own queue.
//! A subscriber whose channel is closed or full is simply skipped; one
//! slow or dead subscriber never blocks delivery to the others.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// A published event: a topic string plus an arbitrary JSON payload and
/// the id of whoever published it (used for self-filtering by callers
/// that don't want their own echo).
#[derive(Debug, Clone)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
    pub sender: String,
}

/// Receive-only handle for a single subscription.
pub struct Subscription {
    pub id: u64,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

struct Subscriber {
    id: u64,
    pattern: String,
    tx: mpsc::UnboundedSender<Event>,
}

/// The broker itself. Cheap to clone — internally `Arc`-backed.
#[derive(Clone, Default)]
pub struct MessageBroker {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a glob topic pattern, e.g. `"agent.*"` or `"*"`.
    pub async fn subscribe(&self, pattern: impl Into<String>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.subscribers.write().await.push(Subscriber {
            id,
            pattern: pattern.into(),
            tx,
        });
        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.write().await.retain(|s| s.id != id);
    }

    /// Publish an event to every subscriber whose pattern matches `topic`.
    /// Failure to deliver to one subscriber (channel closed) never affects
    /// delivery to the others, and is silently dropped from the
    /// subscriber list on the next publish.
    pub async fn publish(&self, topic: impl Into<String>, payload: Value, sender: impl Into<String>) {
        let topic = topic.into();
        let event = Event {
            topic: topic.clone(),
            payload,
            sender: sender.into(),
        };
        let subs = self.subscribers.read().await;
        for sub in subs.iter() {
            if topic_matches(&sub.pattern, &topic) {
                // Isolated failure: an unused / dropped receiver simply
                // means the send returns Err, which we ignore here.
                let _ = sub.tx.send(event.clone());
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

/// Match a dot-segmented glob pattern against a topic. `*` matches exactly
/// one segment; a bare `*` pattern matches everything.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pat_segs: Vec<&str> = pattern.split('.').collect();
    let top_segs: Vec<&str> = topic.split('.').collect();
    if pat_segs.len() != top_segs.len() {
        return false;
    }
    pat_segs
        .iter()
        .zip(top_segs.iter())
        .all(|(p, t)| *p == "*" || p == t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(topic_matches("agent.*", "agent.started"));
        assert!(!topic_matches("agent.*", "workflow.started"));
        assert!(topic_matches("*", "anything.at.all"));
        assert!(!topic_matches("agent.*", "agent.sub.started"));
    }

    #[tokio::test]
    async fn publish_fans_out_to_matching_subscribers_only() {
        let broker = MessageBroker::new();
        let mut agent_sub = broker.subscribe("agent.*").await;
        let mut workflow_sub = broker.subscribe("workflow.*").await;

        broker
            .publish("agent.started", serde_json::json!({"id": 1}), "test")
            .await;

        let got = agent_sub.recv().await.expect("should receive");
        assert_eq!(got.topic, "agent.started");

        // workflow subscriber must not receive the agent event.
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            workflow_sub.recv(),
        )
        .await;
        assert!(timed_out.is_err(), "workflow subscriber should not have received anything");
    }

    #[tokio::test]
    async fn dead_subscriber_does_not_block_others() {
        let broker = MessageBroker::new();
        {
            let _dropped = broker.subscribe("agent.*").await; // immediately dropped
        }
        let mut alive = broker.subscribe("agent.*").await;

        broker
            .publish("agent.started", serde_json::json!(null), "test")
            .await;

        assert!(alive.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_removes_entry() {
        let broker = MessageBroker::new();
        let sub = broker.subscribe("agent.*").await;
        assert_eq!(broker.subscriber_count().await, 1);
        broker.unsubscribe(sub.id).await;
        assert_eq!(broker.subscriber_count().await, 0);
    }
}

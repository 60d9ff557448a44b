//! Pub/Sub adapter: topic-based subscribe/publish for subscriber acks and
//! system notifications. No delivery guarantee beyond best-effort within a
//! single process tree.

use tokio::sync::broadcast;

/// Published by a downstream subscriber to signal it has processed events
/// up to a given version on a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberAck {
    pub subscriber_id: String,
    pub stream_uuid: String,
    pub up_to_version: usize,
}

pub trait PubSub: Send + Sync {
    fn publish_ack(&self, ack: SubscriberAck);
    fn subscribe_acks(&self) -> broadcast::Receiver<SubscriberAck>;
}

/// In-process pub/sub backed by a `tokio::sync::broadcast` channel.
pub struct InMemoryPubSub {
    sender: broadcast::Sender<SubscriberAck>,
}

impl InMemoryPubSub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl PubSub for InMemoryPubSub {
    fn publish_ack(&self, ack: SubscriberAck) {
        // No subscribers is a normal state (nobody cares about consistency
        // waits yet); `send` failing just means that.
        let _ = self.sender.send(ack);
    }

    fn subscribe_acks(&self) -> broadcast::Receiver<SubscriberAck> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_observed_by_subscriber() {
        let pubsub = InMemoryPubSub::default();
        let mut rx = pubsub.subscribe_acks();
        pubsub.publish_ack(SubscriberAck {
            subscriber_id: "projection_x".into(),
            stream_uuid: "bank-account-ACC1".into(),
            up_to_version: 2,
        });
        let ack = rx.recv().await.unwrap();
        assert_eq!(ack.up_to_version, 2);
    }
}

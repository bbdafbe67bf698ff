use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One [`SseHub`] per quiz topic, opened by the first subscriber.
pub struct ProgressBroadcaster {
    capacity: usize,
    topics: DashMap<Uuid, SseHub>,
}

impl ProgressBroadcaster {
    /// Broadcaster whose topics buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: DashMap::new(),
        }
    }

    /// Subscribe to progress updates of `quiz_id`, opening the topic when needed.
    pub fn subscribe(&self, quiz_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.topics
            .entry(quiz_id)
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Fire-and-forget publish; events for topics nobody opened are dropped.
    pub fn publish(&self, quiz_id: Uuid, event: ServerEvent) {
        if let Some(hub) = self.topics.get(&quiz_id) {
            hub.broadcast(event);
        }
    }

    /// Close a topic; connected streams observe the end of the channel.
    pub fn close(&self, quiz_id: Uuid) {
        self.topics.remove(&quiz_id);
    }

    /// Receivers currently attached to the topic of `quiz_id`.
    pub fn subscriber_count(&self, quiz_id: Uuid) -> usize {
        self.topics
            .get(&quiz_id)
            .map(|hub| hub.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;

    fn event(data: &str) -> ServerEvent {
        ServerEvent {
            event: Some("quiz.progress".into()),
            data: data.into(),
        }
    }

    #[test]
    fn publish_reaches_only_the_quiz_topic() {
        let broadcaster = ProgressBroadcaster::new(4);
        let (quiz_a, quiz_b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = broadcaster.subscribe(quiz_a);
        let mut rx_b = broadcaster.subscribe(quiz_b);

        broadcaster.publish(quiz_a, event("a"));

        assert_eq!(rx_a.try_recv().unwrap().data, "a");
        assert!(matches!(rx_b.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(broadcaster.subscriber_count(quiz_a), 1);
    }

    #[test]
    fn publish_without_topic_is_dropped() {
        let broadcaster = ProgressBroadcaster::new(4);
        let quiz_id = Uuid::new_v4();
        broadcaster.publish(quiz_id, event("lost"));

        let mut rx = broadcaster.subscribe(quiz_id);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn closing_a_topic_ends_subscriptions() {
        let broadcaster = ProgressBroadcaster::new(4);
        let quiz_id = Uuid::new_v4();
        let mut rx = broadcaster.subscribe(quiz_id);

        broadcaster.close(quiz_id);

        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert_eq!(broadcaster.subscriber_count(quiz_id), 0);
    }
}

//! Fan-out of change notifications to connected subscribers.
//!
//! Delivery is best-effort and at-most-once: a publish reaches the
//! subscriber set registered at that moment, a slow subscriber loses the
//! event rather than stalling the publisher, and there is no backlog for
//! late joiners. Events from one publisher arrive at a given subscriber
//! in publish order.

use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A structured change event, shaped for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub actor_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secondary_subject: String,
    pub entity_id: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhotoDeleted,
    PhotoUpdated,
    PhotoUploaded,
}

impl NotificationEvent {
    pub fn new(actor_name: impl Into<String>, entity_id: i64, kind: EventKind) -> Self {
        Self {
            actor_name: actor_name.into(),
            secondary_subject: String::new(),
            entity_id,
            kind,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.secondary_subject = subject.into();
        self
    }
}

/// A live connection's receiving end.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<NotificationEvent>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event. Returns `None` once the notifier has shut
    /// down or this subscriber was unsubscribed.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Process-scoped publisher, constructed once at startup and injected
/// into the coordination layer.
pub struct Notifier {
    subscribers: DashMap<Uuid, mpsc::Sender<NotificationEvent>>,
    buffer: usize,
}

impl Notifier {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber. Only events published after this call are
    /// delivered; there is no replay.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.subscribers.insert(id, sender);
        debug!(subscriber = %id, total = self.subscribers.len(), "subscriber connected");
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscriber = %id, total = self.subscribers.len(), "subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every currently connected subscriber without
    /// blocking. A full buffer drops the event for that subscriber only;
    /// a closed channel prunes the subscriber.
    pub fn publish(&self, event: NotificationEvent) {
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    counter!("scatto_notify_drop_total").increment(1);
                    warn!(subscriber = %entry.key(), "subscriber buffer full; event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*entry.key());
                }
            }
        }

        for id in closed {
            self.unsubscribe(id);
        }

        counter!("scatto_notify_publish_total").increment(1);
    }

    /// Disconnect every subscriber; their `recv` calls return `None`.
    pub fn shutdown(&self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: i64) -> NotificationEvent {
        NotificationEvent::new("demo", id, EventKind::PhotoUpdated)
    }

    #[tokio::test]
    async fn publish_reaches_every_current_subscriber() {
        let notifier = Notifier::new(8);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.publish(event(1));

        assert_eq!(first.recv().await, Some(event(1)));
        assert_eq!(second.recv().await, Some(event(1)));
    }

    #[tokio::test]
    async fn late_subscriber_receives_no_backlog() {
        let notifier = Notifier::new(8);
        notifier.publish(event(1));

        let mut late = notifier.subscribe();
        notifier.publish(event(2));

        assert_eq!(late.recv().await, Some(event(2)));
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let notifier = Notifier::new(8);
        let mut subscription = notifier.subscribe();

        for id in 1..=4 {
            notifier.publish(event(id));
        }

        for id in 1..=4 {
            assert_eq!(subscription.recv().await, Some(event(id)));
        }
    }

    #[tokio::test]
    async fn disconnected_subscriber_does_not_affect_others() {
        let notifier = Notifier::new(8);
        let dropped = notifier.subscribe();
        let mut alive = notifier.subscribe();
        drop(dropped);

        notifier.publish(event(1));

        assert_eq!(alive.recv().await, Some(event(1)));
        // The closed channel was pruned from the registry.
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn full_buffer_drops_for_that_subscriber_only() {
        let notifier = Notifier::new(1);
        let mut slow = notifier.subscribe();
        let mut fast = notifier.subscribe();

        notifier.publish(event(1));
        // The fast subscriber drains; the slow one still holds event 1.
        assert_eq!(fast.recv().await, Some(event(1)));

        notifier.publish(event(2));

        assert_eq!(fast.recv().await, Some(event(2)));
        assert_eq!(slow.recv().await, Some(event(1)));
        assert!(slow.try_recv().is_none());
        // Dropping for the slow subscriber did not deregister it.
        assert_eq!(notifier.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn shutdown_disconnects_all_subscribers() {
        let notifier = Notifier::new(8);
        let mut subscription = notifier.subscribe();

        notifier.shutdown();

        assert_eq!(subscription.recv().await, None);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn wire_shape_matches_the_contract() {
        let json = serde_json::to_value(event(42).with_subject("gallery")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "actor_name": "demo",
                "secondary_subject": "gallery",
                "entity_id": 42,
                "kind": "photo_updated",
            })
        );

        let bare = serde_json::to_value(event(42)).unwrap();
        assert!(bare.get("secondary_subject").is_none());
    }
}

//! Event bus for metroboard using tokio::broadcast
//!
//! Mutations publish here so presentation layers (pages, widgets, export
//! views) can refresh without polling.

use crate::models::Month;
use tokio::sync::broadcast;

/// Events emitted by the analytics layer
#[derive(Debug, Clone)]
pub enum DataEvent {
    /// A month's dataset was uploaded or replaced
    DatasetUploaded(Month),
    /// A month's dataset was deleted
    DatasetDeleted(Month),
    /// A station was added to the registry
    StationAdded(String),
}

impl DataEvent {
    /// The month whose derived values this event invalidates, if any.
    pub fn month(&self) -> Option<Month> {
        match self {
            DataEvent::DatasetUploaded(m) | DataEvent::DatasetDeleted(m) => Some(*m),
            DataEvent::StationAdded(_) => None,
        }
    }
}

/// Broadcast bus for data events; multi-consumer, send never blocks.
pub struct EventBus {
    sender: broadcast::Sender<DataEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Default capacity (64 events); mutations are rare.
    pub fn default_capacity() -> Self {
        Self::new(64)
    }

    /// Publish an event to all subscribers. No subscribers is fine.
    pub fn publish(&self, event: DataEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();

        let month: Month = "2025-06".parse().unwrap();
        bus.publish(DataEvent::DatasetUploaded(month));
        bus.publish(DataEvent::StationAdded("Haroun".to_string()));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.month(), Some(month));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, DataEvent::StationAdded(name) if name == "Haroun"));
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default_capacity();
        bus.publish(DataEvent::DatasetDeleted("2025-01".parse().unwrap()));
        assert_eq!(bus.subscriber_count(), 0);
    }
}

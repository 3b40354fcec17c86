//! In-process topic bus.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ops_core::{BusMessage, Publisher, Topic};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// One broadcast channel per topic name. Subscribers see messages published
/// after they subscribed; slow subscribers lag and lose the oldest messages.
pub struct TopicBus {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
}

impl TopicBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to an exact topic name.
    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<BusMessage> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(topic.name().to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Current subscriber count of a topic.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic.name())
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for TopicBus {
    fn publish(&self, topic: &Topic, message: BusMessage) -> usize {
        let channels = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match channels.get(topic.name()) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        }
    }
}

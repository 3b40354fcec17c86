//! Outbound message seam shared by the executor and the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EngineEvent, JobNotification, Topic};

/// A message delivered to topic subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Broadcast name, e.g. `docker.event` or `operation.completed`.
    pub name: String,
    /// Message body.
    pub payload: Value,
    /// When the message was produced.
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// `docker.event` message wrapping one engine event.
    pub fn engine_event(event: &EngineEvent) -> Self {
        let timestamp = Utc::now();
        Self {
            name: "docker.event".to_string(),
            payload: serde_json::json!({
                "event": event.fields(),
                "timestamp": timestamp,
            }),
            timestamp,
        }
    }

    /// `operation.completed` / `operation.failed` message.
    pub fn job_notification(notification: &JobNotification) -> Self {
        let payload = serde_json::to_value(notification).unwrap_or(Value::Null);
        Self::new(notification.name(), payload)
    }

    /// `container.log` message carrying one chunk of log output.
    pub fn container_log(container_id: &str, stream: &str, text: &str) -> Self {
        Self::new(
            "container.log",
            serde_json::json!({
                "container": container_id,
                "stream": stream,
                "text": text,
            }),
        )
    }
}

/// Delivers messages to topic subscribers.
///
/// Implementations return how many subscribers received the message.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, topic: &Topic, message: BusMessage) -> usize;
}

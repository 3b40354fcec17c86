//! Event types relayed from the engine and emitted by the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::JobId;

/// One decoded notification from the engine's event feed.
///
/// The raw object is kept intact so subscribers see every field the
/// engine reported, not just the ones used for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineEvent(Map<String, Value>);

impl EngineEvent {
    /// Wrap a decoded JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Decode a single line of the event feed.
    ///
    /// Returns `None` for blank lines, invalid JSON and JSON that is not an
    /// object.
    pub fn from_line(line: &[u8]) -> Option<Self> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_slice::<Value>(trimmed).ok()? {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Object kind, e.g. `container`, `image`, `volume`, `network`.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("Type").and_then(Value::as_str)
    }

    /// What happened, e.g. `start`, `stop`, `pull`.
    pub fn action(&self) -> Option<&str> {
        self.0.get("Action").and_then(Value::as_str)
    }

    /// Identifier of the object the event is about.
    pub fn actor_id(&self) -> Option<&str> {
        self.0
            .get("Actor")
            .and_then(|actor| actor.get("ID"))
            .and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Notifications emitted when a job that carries a callback token finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobNotification {
    /// The operation returned a result.
    Completed {
        #[serde(rename = "jobId")]
        job_id: JobId,
        operation: String,
        result: Value,
        #[serde(rename = "callback")]
        token: String,
        timestamp: DateTime<Utc>,
    },
    /// The operation failed.
    Failed {
        #[serde(rename = "jobId")]
        job_id: JobId,
        operation: String,
        error: String,
        #[serde(rename = "callback")]
        token: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobNotification {
    /// Broadcast name of the notification.
    pub fn name(&self) -> &'static str {
        match self {
            JobNotification::Completed { .. } => "operation.completed",
            JobNotification::Failed { .. } => "operation.failed",
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobNotification::Completed { job_id, .. } | JobNotification::Failed { job_id, .. } => {
                *job_id
            }
        }
    }

    /// Get a short description of this notification for logging.
    pub fn description(&self) -> String {
        match self {
            JobNotification::Completed {
                job_id, operation, ..
            } => format!("Job {} ({}) completed", job_id, operation),
            JobNotification::Failed {
                job_id,
                operation,
                error,
                ..
            } => format!("Job {} ({}) failed: {}", job_id, operation, error),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn decodes_object_lines_only() {
        let event = EngineEvent::from_line(br#"{"Type":"container","Action":"start","Actor":{"ID":"abc"}}"#);
        let event = event.as_ref();
        assert_eq!(event.and_then(EngineEvent::kind), Some("container"));
        assert_eq!(event.and_then(EngineEvent::action), Some("start"));
        assert_eq!(event.and_then(EngineEvent::actor_id), Some("abc"));

        assert!(EngineEvent::from_line(b"").is_none());
        assert!(EngineEvent::from_line(b"   \r").is_none());
        assert!(EngineEvent::from_line(b"<not json>").is_none());
        assert!(EngineEvent::from_line(b"[1,2,3]").is_none());
        assert!(EngineEvent::from_line(br#"{"Type":"ima"#).is_none());
    }

    #[test]
    fn notification_wire_shape() -> Result<(), serde_json::Error> {
        let job_id = JobId::new();
        let note = JobNotification::Failed {
            job_id,
            operation: "startContainer".into(),
            error: "no such container".into(),
            token: "ui-42".into(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&note)?;
        assert_eq!(value["status"], "failed");
        assert_eq!(value["jobId"], job_id.to_string());
        assert_eq!(value["callback"], "ui-42");
        assert_eq!(note.name(), "operation.failed");
        Ok(())
    }
}

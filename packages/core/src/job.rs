//! Job domain types for asynchronous engine operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// The payload lives on the variant, so a result can only exist on a
/// completed job and an error only on a failed one.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JobStatus {
    /// Job was accepted and is waiting for a worker.
    #[default]
    Queued,
    /// Job is currently being executed by a worker.
    Running,
    /// Job completed successfully.
    Completed { result: Value },
    /// Job failed with an error.
    Failed { error: String },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Completed { .. } | JobStatus::Failed { .. } => 2,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: &'static str,
    pub to: &'static str,
}

/// A tracked asynchronous invocation of one engine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "JobSnapshot", try_from = "JobSnapshot")]
pub struct JobRecord {
    id: JobId,
    operation: String,
    parameters: Vec<Value>,
    status: JobStatus,
    callback: Option<String>,
    updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a freshly queued job with a new ID.
    pub fn queued(
        operation: impl Into<String>,
        parameters: Vec<Value>,
        callback: Option<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            operation: operation.into(),
            parameters,
            status: JobStatus::Queued,
            callback,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Caller-supplied token that enables completion notifications.
    pub fn callback(&self) -> Option<&str> {
        self.callback.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Result payload, present only once the job completed.
    pub fn result(&self) -> Option<&Value> {
        match &self.status {
            JobStatus::Completed { result } => Some(result),
            _ => None,
        }
    }

    /// Error message, present only once the job failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Queued -> Running.
    pub fn mark_running(&mut self) -> Result<(), TransitionError> {
        self.advance(JobStatus::Running)
    }

    /// Running -> Completed.
    pub fn mark_completed(&mut self, result: Value) -> Result<(), TransitionError> {
        self.advance(JobStatus::Completed { result })
    }

    /// Running -> Failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(JobStatus::Failed {
            error: error.into(),
        })
    }

    fn advance(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if next.rank() != self.status.rank() + 1 {
            return Err(TransitionError {
                job_id: self.id,
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Flat wire shape of a [`JobRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobSnapshot {
    id: JobId,
    operation: String,
    #[serde(default)]
    parameters: Vec<Value>,
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    callback: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<JobRecord> for JobSnapshot {
    fn from(record: JobRecord) -> Self {
        let status = record.status.as_str().to_string();
        let (result, error) = match record.status {
            JobStatus::Completed { result } => (Some(result), None),
            JobStatus::Failed { error } => (None, Some(error)),
            JobStatus::Queued | JobStatus::Running => (None, None),
        };
        Self {
            id: record.id,
            operation: record.operation,
            parameters: record.parameters,
            status,
            result,
            error,
            callback: record.callback,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<JobSnapshot> for JobRecord {
    type Error = String;

    fn try_from(snapshot: JobSnapshot) -> Result<Self, Self::Error> {
        let status = match (snapshot.status.as_str(), snapshot.result, snapshot.error) {
            ("queued", None, None) => JobStatus::Queued,
            ("running", None, None) => JobStatus::Running,
            // A null result deserializes as None; completed jobs keep it as JSON null.
            ("completed", result, None) => JobStatus::Completed {
                result: result.unwrap_or(Value::Null),
            },
            ("failed", None, Some(error)) => JobStatus::Failed { error },
            (status, _, _) => {
                return Err(format!(
                    "inconsistent job record {}: status '{}' with mismatched result/error",
                    snapshot.id, status
                ));
            }
        };
        Ok(Self {
            id: snapshot.id,
            operation: snapshot.operation,
            parameters: snapshot.parameters,
            status,
            callback: snapshot.callback,
            updated_at: snapshot.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[test]
    fn transitions_are_monotone() -> Result<(), TransitionError> {
        let mut job = JobRecord::queued("startContainer", vec![json!("abc123")], None);
        assert!(job.mark_completed(json!({})).is_err());

        job.mark_running()?;
        assert!(job.mark_running().is_err());

        job.mark_failed("boom")?;
        assert_eq!(job.error(), Some("boom"));
        assert!(job.result().is_none());
        assert!(job.mark_completed(json!({})).is_err());
        assert_eq!(job.status().as_str(), "failed");
        Ok(())
    }

    #[test]
    fn wire_shape_is_flat() -> Result<(), Box<dyn std::error::Error>> {
        let mut job = JobRecord::queued("pullImage", vec![json!("nginx")], Some("cb".into()));
        job.mark_running()?;
        job.mark_completed(json!({"success": true}))?;

        let value = serde_json::to_value(&job)?;
        assert_eq!(value["status"], "completed");
        assert_eq!(value["result"]["success"], true);
        assert!(value["error"].is_null());
        assert_eq!(value["callback"], "cb");

        let back: JobRecord = serde_json::from_value(value)?;
        assert_eq!(back, job);
        Ok(())
    }

    #[test]
    fn rejects_inconsistent_snapshot() {
        let raw = json!({
            "id": JobId::new().to_string(),
            "operation": "listImages",
            "status": "queued",
            "result": {"oops": true},
            "updated_at": Utc::now(),
        });
        assert!(serde_json::from_value::<JobRecord>(raw).is_err());
    }
}

//! Job submission and status.

use actors::{ExecutorError, JobExecutor};
use ops_core::{JobId, JobRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Request type for submitting an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub operation: String,
    #[serde(default)]
    pub parameters: Vec<JsonValue>,
    #[serde(default)]
    pub callback: Option<String>,
}

/// Acknowledgement returned by [`submit_job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub operation: String,
    pub status: String,
}

/// Queue an operation for asynchronous execution.
pub async fn submit_job(
    executor: &JobExecutor,
    request: SubmitRequest,
) -> Result<SubmitResponse, ExecutorError> {
    let job_id = executor
        .submit(&request.operation, request.parameters, request.callback)
        .await?;
    Ok(SubmitResponse {
        job_id,
        operation: request.operation,
        status: "queued".to_string(),
    })
}

/// Get a job by ID.
pub async fn job_status(executor: &JobExecutor, job_id: &str) -> Result<JobRecord, ExecutorError> {
    executor.status_str(job_id).await
}

/// Supported operation signatures.
pub fn list_operations(executor: &JobExecutor) -> Vec<String> {
    executor
        .registry()
        .specs()
        .iter()
        .map(|spec| spec.signature())
        .collect()
}

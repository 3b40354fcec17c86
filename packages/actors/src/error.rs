//! Executor errors.

use db::StoreError;
use engine::EngineError;
use ops_core::JobId;
use thiserror::Error;

/// Errors returned by [`JobExecutor`](crate::JobExecutor) and the operation
/// registry.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No operation with this name exists; nothing was recorded.
    #[error("Unsupported operation: {name}")]
    UnsupportedOperation { name: String },

    /// Parameter count or kinds do not match the operation's signature.
    #[error("Invalid parameters for {operation}: {reason}")]
    InvalidParameters { operation: String, reason: String },

    /// A parameter failed identifier validation.
    #[error(transparent)]
    InvalidIdentifier(#[from] EngineError),

    /// Unknown or expired job id.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// A job id string could not be parsed.
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Actor error: {0}")]
    Actor(String),
}

//! Service surface for the operation executor and the event relay.
//!
//! This crate wires the pieces together for a host process:
//! - Runtime configuration from the environment
//! - Job submission and status lookups
//! - Server-sent event framing for log and event streams

mod config;
mod init;
mod jobs;
pub mod sse;

pub use config::{ConfigError, RuntimeConfig};
pub use init::{Runtime, init_runtime, init_with};
pub use jobs::{SubmitRequest, SubmitResponse, job_status, list_operations, submit_job};

// Re-export core types for convenience
pub use ops_core::{BusMessage, JobId, JobRecord, JobStatus, Topic};

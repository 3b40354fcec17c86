//! Actor-based executor for engine operations.
//!
//! Operations are submitted by name with positional JSON parameters, bound
//! through the [`OperationRegistry`], recorded as queued jobs and run by a
//! pool of worker actors.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor owning the dispatcher and workers
//! - `DispatcherActor` - FIFO of submitted work
//! - `WorkerActor` - Pulls work, runs it, records the outcome
//!
//! # Usage
//!
//! ```ignore
//! use actors::{ExecutorConfig, JobExecutor};
//!
//! let executor = JobExecutor::start(ExecutorConfig::default(), client, store, bus).await?;
//! let job_id = executor.submit("startContainer", vec![json!("abc123")], None).await?;
//! let record = executor.status(job_id).await?;
//! ```

mod dispatcher_actor;
mod error;
mod executor;
mod messages;
pub mod operations;
mod supervisor;
mod worker_actor;

pub use dispatcher_actor::DispatcherActor;
pub use error::ExecutorError;
pub use executor::{ExecutorConfig, JobExecutor};
pub use messages::{DispatcherMessage, SupervisorMessage, WorkItem, WorkerMessage};
pub use operations::{OperationCall, OperationRegistry, OperationSpec, ParamKind, ParamSpec};
pub use supervisor::{Supervisor, SupervisorArgs, start_supervisor};
pub use worker_actor::{WorkerActor, WorkerContext};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};

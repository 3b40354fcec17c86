//! Core domain types for the engine operation executor and event relay.
//!
//! This crate contains shared types used across all packages:
//! - JobRecord and JobStatus for asynchronous operations
//! - EngineEvent and JobNotification for relayed and emitted events
//! - Topic addressing and the Publisher seam

mod events;
mod job;
mod publish;
mod topic;

pub use events::{EngineEvent, JobNotification};
pub use job::{JobId, JobRecord, JobStatus, TransitionError};
pub use publish::{BusMessage, Publisher};
pub use topic::{Topic, TopicScheme, Visibility};

//! Typed repositories over a [`KeyValueStore`](crate::KeyValueStore).

mod broadcaster_repo;
mod job_repo;

pub use broadcaster_repo::BroadcasterRepository;
pub use job_repo::JobRepository;

use std::time::Duration;

/// Default retention for stored records.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

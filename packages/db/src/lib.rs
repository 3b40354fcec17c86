//! Expiring storage for job records and relay run state.
//!
//! # Backends
//!
//! - [`MemoryStore`]: process-local map, the default
//! - [`SurrealStore`]: SurrealDB `cache` table (`mem://` by default,
//!   `rocksdb://` with the `rocksdb` feature)

mod connection;
mod schema;
mod store;
pub mod repositories;

pub use connection::{Database, DbConfig, StoreError, connect_db};
pub use repositories::{BroadcasterRepository, JobRepository};
pub use schema::init_schema;
pub use store::{KeyValueStore, MemoryStore, StoreConfig, StoreFuture, SurrealStore, spawn_purger};

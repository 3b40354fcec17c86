//! Job record persistence.

use std::sync::Arc;
use std::time::Duration;

use ops_core::{JobId, JobRecord};

use super::DEFAULT_RETENTION;
use crate::{KeyValueStore, StoreError};

/// Stores job records under `job:{id}`. Every save replaces the record and
/// restarts its retention window.
#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn KeyValueStore>,
    retention: Duration,
}

impl JobRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn key(id: JobId) -> String {
        format!("job:{}", id)
    }

    /// Write the full record.
    pub async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.store
            .put(&Self::key(record.id()), value, self.retention)
            .await?;
        tracing::debug!("saved job {} as {}", record.id(), record.status().as_str());
        Ok(())
    }

    /// Load a record; `None` for unknown or expired ids.
    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        match self.store.get(&Self::key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        self.store.delete(&Self::key(id)).await
    }
}

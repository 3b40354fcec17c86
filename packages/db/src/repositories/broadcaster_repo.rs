//! Relay run-state persistence.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::DEFAULT_RETENTION;
use crate::{KeyValueStore, StoreError};

/// Stores one run-state snapshot per relay instance under
/// `broadcaster:{instance}`.
#[derive(Clone)]
pub struct BroadcasterRepository {
    store: Arc<dyn KeyValueStore>,
    retention: Duration,
}

impl BroadcasterRepository {
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

    fn key(instance_id: &str) -> String {
        format!("broadcaster:{}", instance_id)
    }

    pub async fn save<T: Serialize>(&self, instance_id: &str, state: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(state)?;
        self.store
            .put(&Self::key(instance_id), value, self.retention)
            .await
    }

    pub async fn get<T: DeserializeOwned>(&self, instance_id: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(&Self::key(instance_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

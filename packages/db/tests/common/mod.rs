use std::sync::Arc;

use db::{DbConfig, KeyValueStore, MemoryStore, StoreError, SurrealStore};

pub fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

/// Fresh in-memory SurrealDB per test; each connection gets its own datastore.
pub async fn surreal_store() -> Result<Arc<dyn KeyValueStore>, StoreError> {
    let store = SurrealStore::open(&DbConfig::memory()).await?;
    Ok(Arc::new(store))
}

/// Both backends, so the repository tests run against each.
pub async fn stores() -> Result<Vec<(&'static str, Arc<dyn KeyValueStore>)>, StoreError> {
    Ok(vec![
        ("memory", memory_store()),
        ("surreal", surreal_store().await?),
    ])
}

//! Expiring key-value storage.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::sql::Thing;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::connection::{Database, DbConfig, StoreError, connect_db};
use crate::schema::init_schema;

/// Future type returned by stores.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Key-value storage with per-entry expiry. Every write replaces the whole
/// value under its key.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Store `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: Value, ttl: Duration) -> StoreFuture<'_, ()>;

    /// Load the value under `key`. Expired entries read as absent.
    fn get(&self, key: &str) -> StoreFuture<'_, Option<Value>>;

    /// Remove the entry under `key` if present.
    fn delete(&self, key: &str) -> StoreFuture<'_, ()>;

    /// Drop every expired entry; returns how many were removed.
    fn purge_expired(&self) -> StoreFuture<'_, usize>;
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: Value, ttl: Duration) -> StoreFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            let expires_at = Instant::now() + ttl;
            self.entries.write().await.insert(key, (value, expires_at));
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreFuture<'_, Option<Value>> {
        let key = key.to_string();
        Box::pin(async move {
            let now = Instant::now();
            {
                let entries = self.entries.read().await;
                match entries.get(&key) {
                    None => return Ok(None),
                    Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                    Some(_) => {}
                }
            }
            self.entries.write().await.remove(&key);
            Ok(None)
        })
    }

    fn delete(&self, key: &str) -> StoreFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            self.entries.write().await.remove(&key);
            Ok(())
        })
    }

    fn purge_expired(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, (_, expires_at)| *expires_at > now);
            Ok(before - entries.len())
        })
    }
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    key: String,
    body: String,
    /// Unix milliseconds.
    expires_at: i64,
}

const CACHE_TABLE: &str = "cache";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Store backed by a SurrealDB `cache` table.
#[derive(Clone)]
pub struct SurrealStore {
    db: Database,
}

impl SurrealStore {
    /// Connect and make sure the schema exists.
    pub async fn open(config: &DbConfig) -> Result<Self, StoreError> {
        let db = connect_db(config).await?;
        init_schema(&db).await?;
        Ok(Self { db })
    }

    /// Wrap an already connected database. The schema must be initialized.
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SurrealStore {
    fn put(&self, key: &str, value: Value, ttl: Duration) -> StoreFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            let entry = CacheEntry {
                id: None,
                key: key.clone(),
                body: serde_json::to_string(&value)?,
                expires_at: now_millis().saturating_add(ttl_ms),
            };
            let stored: Option<CacheEntry> = self
                .db
                .upsert((CACHE_TABLE, key.clone()))
                .content(entry)
                .await?;
            if stored.is_none() {
                return Err(StoreError::Query(format!("Failed to store {}", key)));
            }
            tracing::debug!("stored {}", key);
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreFuture<'_, Option<Value>> {
        let key = key.to_string();
        Box::pin(async move {
            let entry: Option<CacheEntry> = self.db.select((CACHE_TABLE, key.clone())).await?;
            match entry {
                Some(entry) if entry.expires_at > now_millis() => {
                    Ok(Some(serde_json::from_str(&entry.body)?))
                }
                Some(_) => {
                    let _: Option<CacheEntry> = self.db.delete((CACHE_TABLE, key.clone())).await?;
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }

    fn delete(&self, key: &str) -> StoreFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            let _: Option<CacheEntry> = self.db.delete((CACHE_TABLE, key.clone())).await?;
            Ok(())
        })
    }

    fn purge_expired(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let mut response = self
                .db
                .query("DELETE cache WHERE expires_at <= $now RETURN BEFORE")
                .bind(("now", now_millis()))
                .await?
                .check()?;
            let removed: Vec<CacheEntry> = response.take(0)?;
            Ok(removed.len())
        })
    }
}

/// Spawn a task that purges `store` every `every`. The task ends once the
/// store is dropped.
pub fn spawn_purger(store: &Arc<dyn KeyValueStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    let store = Arc::downgrade(store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Purged {} expired entries", removed),
                Err(e) => tracing::warn!("Failed to purge expired entries: {}", e),
            }
        }
    })
}

/// Which backend to open.
#[derive(Debug, Clone, Default)]
pub enum StoreConfig {
    #[default]
    Memory,
    Surreal(DbConfig),
}

impl StoreConfig {
    /// `"memory"` (or empty) selects the in-process store; anything else is
    /// taken as a SurrealDB endpoint.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "memory" => Self::Memory,
            endpoint => Self::Surreal(DbConfig::endpoint(endpoint)),
        }
    }

    pub async fn open(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        match self {
            StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreConfig::Surreal(config) => Ok(Arc::new(SurrealStore::open(config).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn memory_entries_expire() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("job:a", json!({"n": 1}), Duration::from_secs(60)).await?;
        store.put("job:b", json!({"n": 2}), Duration::from_secs(3600)).await?;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get("job:a").await?, Some(json!({"n": 1})));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("job:a").await?, None);
        assert_eq!(store.purge_expired().await?, 0);
        assert!(store.get("job:b").await?.is_some());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn purger_drops_entries_nobody_reads() -> Result<(), StoreError> {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn KeyValueStore> = memory.clone();
        for n in 0..20 {
            store
                .put(&format!("job:{n}"), json!({"n": n}), Duration::from_secs(60))
                .await?;
        }
        store.put("job:kept", json!({}), Duration::from_secs(3600)).await?;
        let purger = spawn_purger(&store, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(memory.len().await, 21);

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(memory.len().await, 1);

        drop(store);
        drop(memory);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(purger.is_finished());
        Ok(())
    }

    #[test]
    fn parses_store_config() {
        assert!(matches!(StoreConfig::parse("memory"), StoreConfig::Memory));
        assert!(matches!(StoreConfig::parse(""), StoreConfig::Memory));
        match StoreConfig::parse("mem://") {
            StoreConfig::Surreal(config) => assert_eq!(config.endpoint, "mem://"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

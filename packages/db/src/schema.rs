//! Database schema definitions using SurrealQL.

use crate::{Database, StoreError};

/// Define the tables used by the store. Safe to run repeatedly.
pub async fn init_schema(db: &Database) -> Result<(), StoreError> {
    tracing::info!("Initializing database schema...");
    db.query(CACHE_SCHEMA).await?.check()?;
    tracing::info!("Database schema initialized");
    Ok(())
}

/// Expiring key-value entries. `body` holds the JSON text of the value.
const CACHE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS cache SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS key ON cache TYPE string;
DEFINE FIELD IF NOT EXISTS body ON cache TYPE string;
DEFINE FIELD IF NOT EXISTS expires_at ON cache TYPE int;

DEFINE INDEX IF NOT EXISTS cache_expires ON cache FIELDS expires_at;
"#;

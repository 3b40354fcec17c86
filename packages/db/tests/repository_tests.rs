#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use db::{BroadcasterRepository, DbConfig, JobRepository, KeyValueStore, SurrealStore};
use ops_core::{JobId, JobRecord, JobStatus};
use serde_json::{Value, json};

#[tokio::test]
async fn job_records_round_trip_through_each_backend() -> Result<(), Box<dyn Error>> {
    for (backend, store) in common::stores().await? {
        let jobs = JobRepository::new(store);

        let mut record = JobRecord::queued(
            "startContainer",
            vec![json!("abc123")],
            Some("ui-7".to_string()),
        );
        jobs.save(&record).await?;

        let loaded = jobs.get(record.id()).await?.expect(backend);
        assert_eq!(loaded.status(), &JobStatus::Queued, "{backend}");
        assert_eq!(loaded.parameters(), &[json!("abc123")]);
        assert_eq!(loaded.callback(), Some("ui-7"));

        record.mark_running()?;
        record.mark_completed(json!({"success": true}))?;
        jobs.save(&record).await?;

        let loaded = jobs.get(record.id()).await?.expect(backend);
        assert_eq!(loaded.result(), Some(&json!({"success": true})), "{backend}");
        assert_eq!(loaded.error(), None);
    }
    Ok(())
}

#[tokio::test]
async fn unknown_and_deleted_jobs_are_absent() -> Result<(), Box<dyn Error>> {
    for (backend, store) in common::stores().await? {
        let jobs = JobRepository::new(store);
        assert!(jobs.get(JobId::new()).await?.is_none(), "{backend}");

        let record = JobRecord::queued("listImages", vec![], None);
        jobs.save(&record).await?;
        jobs.delete(record.id()).await?;
        assert!(jobs.get(record.id()).await?.is_none(), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn surreal_entries_expire() -> Result<(), Box<dyn Error>> {
    let store = SurrealStore::open(&DbConfig::memory()).await?;
    store
        .put("job:short", json!({"n": 1}), Duration::from_millis(20))
        .await?;
    store
        .put("job:unread", json!({"n": 3}), Duration::from_millis(20))
        .await?;
    store
        .put("job:long", json!({"n": 2}), Duration::from_secs(3600))
        .await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.get("job:short").await?, None);

    assert_eq!(store.purge_expired().await?, 1);
    assert_eq!(store.get("job:long").await?, Some(json!({"n": 2})));
    Ok(())
}

#[tokio::test]
async fn broadcaster_state_is_keyed_by_instance() -> Result<(), Box<dyn Error>> {
    let store = common::memory_store();
    let repo = BroadcasterRepository::new(store.clone());

    repo.save("relay-a", &json!({"status": "running"})).await?;
    repo.save("relay-b", &json!({"status": "stopped"})).await?;

    let a: Option<Value> = repo.get("relay-a").await?;
    assert_eq!(a, Some(json!({"status": "running"})));
    assert!(store.get("broadcaster:relay-b").await?.is_some());
    assert!(repo.get::<Value>("relay-c").await?.is_none());
    Ok(())
}

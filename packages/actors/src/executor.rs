//! Public handle over the executor actors.

use std::sync::Arc;
use std::time::Duration;

use db::{JobRepository, KeyValueStore, spawn_purger};
use engine::EngineClient;
use ops_core::{JobId, JobRecord, Publisher, TopicScheme};
use ractor::ActorRef;
use ractor::rpc::CallResult;
use serde_json::Value;

use crate::error::ExecutorError;
use crate::messages::{SupervisorMessage, WorkItem};
use crate::operations::OperationRegistry;
use crate::supervisor::{SupervisorArgs, start_supervisor};
use crate::worker_actor::WorkerContext;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker actors.
    pub workers: usize,
    /// How long job records are kept.
    pub retention: Duration,
    /// How often an idle worker asks for work.
    pub poll_interval: Duration,
    /// How often expired entries are swept from the store.
    pub purge_interval: Duration,
    /// Topic names used for job notifications.
    pub topics: TopicScheme,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retention: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_millis(100),
            purge_interval: Duration::from_secs(5 * 60),
            topics: TopicScheme::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_purge_interval(mut self, purge_interval: Duration) -> Self {
        self.purge_interval = purge_interval;
        self
    }

    pub fn with_topics(mut self, topics: TopicScheme) -> Self {
        self.topics = topics;
        self
    }
}

/// Accepts operations by name and runs them on the worker pool.
///
/// `submit` returns as soon as the job is recorded and queued; results are
/// read back with `status` or delivered as notifications when the job
/// carries a callback token.
pub struct JobExecutor {
    registry: OperationRegistry,
    jobs: JobRepository,
    supervisor: ActorRef<SupervisorMessage>,
    handle: tokio::task::JoinHandle<()>,
    purger: tokio::task::JoinHandle<()>,
}

impl JobExecutor {
    /// Spawn the supervisor, dispatcher and workers.
    pub async fn start(
        config: ExecutorConfig,
        client: EngineClient,
        store: Arc<dyn KeyValueStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, ExecutorError> {
        let purger = spawn_purger(&store, config.purge_interval);
        let jobs = JobRepository::new(store).with_retention(config.retention);
        let context = WorkerContext {
            client,
            jobs: jobs.clone(),
            publisher,
            topics: config.topics.clone(),
        };
        let (supervisor, handle) = start_supervisor(SupervisorArgs {
            workers: config.workers,
            poll_interval: config.poll_interval,
            context,
        })
        .await
        .map_err(|e| {
            purger.abort();
            ExecutorError::Actor(format!("Failed to start executor: {}", e))
        })?;

        Ok(Self {
            registry: OperationRegistry::new(),
            jobs,
            supervisor,
            handle,
            purger,
        })
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Record a queued job and hand it to the dispatcher. Unknown operations
    /// and bad parameters are rejected before anything is stored; a job the
    /// dispatcher did not accept is removed again.
    pub async fn submit(
        &self,
        operation: &str,
        parameters: Vec<Value>,
        callback: Option<String>,
    ) -> Result<JobId, ExecutorError> {
        let call = self.registry.bind(operation, &parameters)?;
        let record = JobRecord::queued(operation, parameters, callback);
        let job_id = record.id();

        self.jobs.save(&record).await?;

        let result = ractor::rpc::call(
            &self.supervisor,
            |reply| SupervisorMessage::Enqueue {
                work: Box::new(WorkItem { record, call }),
                reply,
            },
            None,
        )
        .await;

        let error = match result {
            Ok(CallResult::Success(Ok(()))) => {
                tracing::debug!("Submitted job {} ({})", job_id, operation);
                return Ok(job_id);
            }
            Ok(CallResult::Success(Err(e))) => ExecutorError::Actor(e),
            Ok(_) => ExecutorError::Actor("Supervisor did not answer".into()),
            Err(e) => ExecutorError::Actor(e.to_string()),
        };
        if let Err(e) = self.jobs.delete(job_id).await {
            tracing::warn!("Failed to remove rejected job {}: {}", job_id, e);
        }
        Err(error)
    }

    /// Current record of a job.
    pub async fn status(&self, job_id: JobId) -> Result<JobRecord, ExecutorError> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or(ExecutorError::JobNotFound(job_id))
    }

    /// [`status`](Self::status) for an external id string.
    pub async fn status_str(&self, job_id: &str) -> Result<JobRecord, ExecutorError> {
        let job_id = JobId::parse(job_id).map_err(|_| ExecutorError::InvalidJobId(job_id.to_string()))?;
        self.status(job_id).await
    }

    /// Number of live worker actors.
    pub async fn worker_count(&self) -> Result<usize, ExecutorError> {
        let result = ractor::rpc::call(
            &self.supervisor,
            |reply| SupervisorMessage::WorkerCount { reply },
            Some(Duration::from_secs(5)),
        )
        .await
        .map_err(|e| ExecutorError::Actor(e.to_string()))?;
        match result {
            ractor::rpc::CallResult::Success(count) => Ok(count),
            _ => Err(ExecutorError::Actor("Supervisor did not answer".into())),
        }
    }

    /// Stop every actor and wait for the supervisor to exit. Queued jobs
    /// that no worker picked up stay Queued until they expire.
    pub async fn shutdown(self) -> Result<(), ExecutorError> {
        self.purger.abort();
        self.supervisor
            .send_message(SupervisorMessage::Shutdown)
            .map_err(|e| ExecutorError::Actor(e.to_string()))?;
        self.handle
            .await
            .map_err(|e| ExecutorError::Actor(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use db::MemoryStore;
    use engine::EngineConfig;
    use ops_core::{BusMessage, Topic};

    struct Discard;

    impl Publisher for Discard {
        fn publish(&self, _topic: &Topic, _message: BusMessage) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn rejected_enqueue_leaves_no_record() -> Result<(), ExecutorError> {
        let store = Arc::new(MemoryStore::new());
        let executor = JobExecutor::start(
            ExecutorConfig::default().with_workers(0),
            EngineClient::new(EngineConfig::default()),
            store.clone(),
            Arc::new(Discard),
        )
        .await?;

        executor.supervisor.stop(None);
        for _ in 0..100 {
            if executor.handle.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let result = executor.submit("listImages", vec![], None).await;
        assert!(matches!(result, Err(ExecutorError::Actor(_))));
        assert!(store.is_empty().await);
        Ok(())
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{ExecutorConfig, ExecutorError, JobExecutor};
use db::MemoryStore;
use engine::{
    EngineClient, EngineConfig, EngineError, EngineRequest, EngineResponse, StreamingResponse,
    Transport, TransportFuture,
};
use http::StatusCode;
use ops_core::{BusMessage, JobId, JobRecord, Publisher, Topic};

/// Engine stand-in answering from a script; unscripted requests get `200 {}`.
#[derive(Default)]
pub struct ScriptedEngine {
    requests: Mutex<Vec<EngineRequest>>,
    responses: Mutex<VecDeque<(u16, &'static str)>>,
}

#[allow(dead_code)]
impl ScriptedEngine {
    pub fn respond(&self, status: u16, body: &'static str) {
        self.responses.lock().unwrap().push_back((status, body));
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for ScriptedEngine {
    fn send(&self, request: EngineRequest) -> TransportFuture<'_, EngineResponse> {
        self.requests.lock().unwrap().push(request);
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((200, "{}"));
        Box::pin(async move {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(EngineResponse::new(status, body))
        })
    }

    fn stream(&self, _request: EngineRequest) -> TransportFuture<'_, StreamingResponse> {
        Box::pin(async { Err(EngineError::Unreachable("streaming not scripted".into())) })
    }
}

/// Publisher that keeps every message.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(Topic, BusMessage)>>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn messages(&self) -> Vec<(Topic, BusMessage)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &Topic, message: BusMessage) -> usize {
        self.messages.lock().unwrap().push((topic.clone(), message));
        1
    }
}

pub struct Harness {
    pub executor: JobExecutor,
    pub engine: Arc<ScriptedEngine>,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
}

pub async fn start(workers: usize) -> Result<Harness, ExecutorError> {
    start_with(
        ExecutorConfig::default()
            .with_workers(workers)
            .with_poll_interval(Duration::from_millis(10)),
    )
    .await
}

pub async fn start_with(config: ExecutorConfig) -> Result<Harness, ExecutorError> {
    let engine = Arc::new(ScriptedEngine::default());
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let client = EngineClient::with_transport(EngineConfig::default(), engine.clone());

    let executor = JobExecutor::start(config, client, store.clone(), publisher.clone()).await?;

    Ok(Harness {
        executor,
        engine,
        store,
        publisher,
    })
}

/// Poll until the job reaches a terminal state, collecting every status seen.
#[allow(dead_code)]
pub async fn wait_terminal(
    executor: &JobExecutor,
    job_id: JobId,
) -> Result<(JobRecord, Vec<&'static str>), ExecutorError> {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let record = executor.status(job_id).await?;
        let status = record.status().as_str();
        if seen.last() != Some(&status) {
            seen.push(status);
        }
        if record.status().is_terminal() {
            return Ok((record, seen));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Err(ExecutorError::Actor(format!("job {} never finished", job_id)))
}

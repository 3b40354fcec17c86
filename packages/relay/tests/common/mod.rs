use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use db::MemoryStore;
use engine::{
    EngineClient, EngineConfig, EngineError, EngineRequest, EngineResponse, StreamingResponse,
    Transport, TransportFuture,
};
use futures_util::{StreamExt, stream};
use http::StatusCode;
use relay::{Broadcaster, RelayConfig, TopicBus};

/// How a scripted stream behaves once its chunks are delivered.
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum Ending {
    Eof,
    HoldOpen,
    Fail,
}

struct Script {
    status: u16,
    chunks: Vec<Bytes>,
    ending: Ending,
}

/// Engine whose streaming endpoints replay scripted bodies.
#[derive(Default)]
pub struct StreamingEngine {
    requests: Mutex<Vec<EngineRequest>>,
    scripts: Mutex<VecDeque<Script>>,
}

#[allow(dead_code)]
impl StreamingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, status: u16, chunks: &[&[u8]], ending: Ending) {
        let chunks = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
        self.scripts.lock().unwrap().push_back(Script {
            status,
            chunks,
            ending,
        });
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for StreamingEngine {
    fn send(&self, request: EngineRequest) -> TransportFuture<'_, EngineResponse> {
        self.requests.lock().unwrap().push(request);
        Box::pin(async { Ok(EngineResponse::new(StatusCode::OK, "{}")) })
    }

    fn stream(&self, request: EngineRequest) -> TransportFuture<'_, StreamingResponse> {
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front();
        Box::pin(async move {
            let Some(script) = script else {
                return Err(EngineError::Unreachable("no scripted stream".into()));
            };
            let status = StatusCode::from_u16(script.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let chunks = stream::iter(script.chunks.into_iter().map(Ok::<_, EngineError>));
            let body = match script.ending {
                Ending::Eof => chunks.boxed(),
                Ending::HoldOpen => chunks.chain(stream::pending()).boxed(),
                Ending::Fail => chunks
                    .chain(stream::once(async {
                        Err(EngineError::Unreachable("connection reset".into()))
                    }))
                    .boxed(),
            };
            Ok(StreamingResponse { status, body })
        })
    }
}

pub struct Harness {
    pub engine: Arc<StreamingEngine>,
    pub bus: Arc<TopicBus>,
    pub store: Arc<MemoryStore>,
    pub broadcaster: Arc<Broadcaster>,
}

pub fn harness() -> Harness {
    let engine = StreamingEngine::new();
    let bus = Arc::new(TopicBus::new());
    let store = Arc::new(MemoryStore::new());
    let client = EngineClient::with_transport(EngineConfig::default(), engine.clone());
    let config = RelayConfig::default().with_poll_interval(Duration::from_millis(20));
    let broadcaster = Broadcaster::new(client, bus.clone(), config).with_store(store.clone());
    Harness {
        engine,
        bus,
        store,
        broadcaster: Arc::new(broadcaster),
    }
}

/// Wait until the relay reports Running.
#[allow(dead_code)]
pub async fn wait_running(broadcaster: &Broadcaster) {
    let handle = broadcaster.handle();
    for _ in 0..200 {
        if handle.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("relay never started");
}

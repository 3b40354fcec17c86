use std::sync::Arc;
use std::time::Duration;

use api::{Runtime, RuntimeConfig, init_with};
use bytes::Bytes;
use db::MemoryStore;
use engine::{
    EngineClient, EngineConfig, EngineError, EngineRequest, EngineResponse, StreamingResponse,
    Transport, TransportFuture,
};
use futures_util::{StreamExt, stream};
use http::StatusCode;

/// Engine answering every call with `200 []` and every stream with two
/// event lines followed by a dropped connection.
pub struct FixedEngine;

impl Transport for FixedEngine {
    fn send(&self, _request: EngineRequest) -> TransportFuture<'_, EngineResponse> {
        Box::pin(async { Ok(EngineResponse::new(StatusCode::OK, "[]")) })
    }

    fn stream(&self, _request: EngineRequest) -> TransportFuture<'_, StreamingResponse> {
        Box::pin(async {
            let chunks = [
                Bytes::from_static(b"{\"Type\":\"image\",\"Action\":\"pull\"}\n"),
                Bytes::from_static(b"{\"Type\":\"volume\",\"Action\":\"create\"}\n"),
            ];
            let body = stream::iter(chunks.into_iter().map(Ok::<_, EngineError>))
                .chain(stream::once(async {
                    Err(EngineError::Unreachable("connection reset".into()))
                }))
                .boxed();
            Ok(StreamingResponse {
                status: StatusCode::OK,
                body,
            })
        })
    }
}

pub fn client() -> EngineClient {
    EngineClient::with_transport(EngineConfig::default(), Arc::new(FixedEngine))
}

pub async fn runtime(workers: usize) -> Runtime {
    let mut config = RuntimeConfig::default();
    config.executor = config
        .executor
        .with_workers(workers)
        .with_poll_interval(Duration::from_millis(10));
    init_with(config, client(), Arc::new(MemoryStore::new()))
        .await
        .unwrap()
}

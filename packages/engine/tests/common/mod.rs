use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use engine::{
    EngineClient, EngineConfig, EngineError, EngineRequest, EngineResponse, StreamingResponse,
    Transport, TransportFuture,
};
use futures_util::stream;
use http::StatusCode;

/// Transport that records every request and answers from a script.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<EngineRequest>>,
    responses: Mutex<VecDeque<(StatusCode, Vec<Bytes>)>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response with a single body chunk.
    pub fn respond(&self, status: u16, body: &str) {
        self.respond_chunks(status, &[body.as_bytes()]);
    }

    /// Queue a response whose body arrives in several chunks.
    pub fn respond_chunks(&self, status: u16, chunks: &[&[u8]]) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let chunks = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
        self.responses.lock().unwrap().push_back((status, chunks));
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next(&self, request: EngineRequest) -> Result<(StatusCode, Vec<Bytes>), EngineError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::Unreachable("no scripted response".into()))
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: EngineRequest) -> TransportFuture<'_, EngineResponse> {
        let next = self.next(request);
        Box::pin(async move {
            let (status, chunks) = next?;
            Ok(EngineResponse::new(status, chunks.concat()))
        })
    }

    fn stream(&self, request: EngineRequest) -> TransportFuture<'_, StreamingResponse> {
        let next = self.next(request);
        Box::pin(async move {
            let (status, chunks) = next?;
            let body = stream::iter(chunks.into_iter().map(Ok::<_, EngineError>));
            Ok(StreamingResponse {
                status,
                body: Box::pin(body),
            })
        })
    }
}

pub fn client(transport: &Arc<RecordingTransport>) -> EngineClient {
    EngineClient::with_transport(EngineConfig::default(), transport.clone())
}

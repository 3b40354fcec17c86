//! Request/response plumbing between the client and the engine socket.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http::{Method, Request, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use hyperlocal::UnixConnector;
use serde_json::Value;

use crate::config::{EngineConfig, EngineEndpoint};
use crate::error::EngineError;

/// Future type returned by transports.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

/// Unbounded body of a streaming call. Dropping it closes the connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, EngineError>> + Send>>;

/// One control-API request.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub method: Method,
    /// Versioned path, e.g. `/v1.41/containers/json`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl EngineRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus url-encoded query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl EngineResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Response whose body is consumed incrementally.
pub struct StreamingResponse {
    pub status: StatusCode,
    pub body: ByteStream,
}

/// Carries requests to the engine.
///
/// Implemented over the engine socket by [`HyperTransport`]; tests supply
/// their own implementations.
pub trait Transport: Send + Sync + 'static {
    /// Send a request and buffer the whole response.
    fn send(&self, request: EngineRequest) -> TransportFuture<'_, EngineResponse>;

    /// Send a request and hand back the body as a stream.
    fn stream(&self, request: EngineRequest) -> TransportFuture<'_, StreamingResponse>;
}

enum Connection {
    Unix {
        client: Client<UnixConnector, Full<Bytes>>,
        socket: PathBuf,
    },
    Tcp {
        client: Client<HttpConnector, Full<Bytes>>,
        authority: String,
    },
}

/// HTTP/1 transport over a Unix socket or TCP.
pub struct HyperTransport {
    connection: Connection,
    request_timeout: Duration,
}

impl HyperTransport {
    pub fn new(config: &EngineConfig) -> Self {
        let connection = match &config.endpoint {
            EngineEndpoint::Unix(socket) => Connection::Unix {
                client: Client::builder(TokioExecutor::new()).build(UnixConnector),
                socket: socket.clone(),
            },
            EngineEndpoint::Tcp(authority) => Connection::Tcp {
                client: Client::builder(TokioExecutor::new()).build_http(),
                authority: authority.clone(),
            },
        };
        Self {
            connection,
            request_timeout: config.request_timeout,
        }
    }

    fn uri(&self, path_and_query: &str) -> Result<Uri, EngineError> {
        match &self.connection {
            Connection::Unix { socket, .. } => Ok(hyperlocal::Uri::new(socket, path_and_query).into()),
            Connection::Tcp { authority, .. } => format!("http://{}{}", authority, path_and_query)
                .parse::<Uri>()
                .map_err(|e| EngineError::InvalidEndpoint(e.to_string())),
        }
    }

    async fn dispatch(&self, request: EngineRequest) -> Result<http::Response<Incoming>, EngineError> {
        let uri = self.uri(&request.path_and_query())?;

        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .header(header::ACCEPT, "application/json");

        let body = match &request.body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                let bytes = serde_json::to_vec(json).map_err(|e| {
                    EngineError::MalformedResponse(format!("Failed to serialize request: {}", e))
                })?;
                Full::new(Bytes::from(bytes))
            }
            None => Full::new(Bytes::new()),
        };

        let req = builder
            .body(body)
            .map_err(|e| EngineError::Unreachable(format!("Failed to build request: {}", e)))?;

        tracing::debug!("{} {}", request.method, request.path);

        let result = match &self.connection {
            Connection::Unix { client, .. } => client.request(req).await,
            Connection::Tcp { client, .. } => client.request(req).await,
        };

        result.map_err(|e| EngineError::Unreachable(format!("Failed to call engine API: {}", e)))
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: EngineRequest) -> TransportFuture<'_, EngineResponse> {
        Box::pin(async move {
            let exchange = async {
                let res = self.dispatch(request).await?;
                let status = res.status();
                let body = res
                    .into_body()
                    .collect()
                    .await
                    .map_err(|e| {
                        EngineError::Unreachable(format!("Failed to read response body: {}", e))
                    })?
                    .to_bytes();
                Ok(EngineResponse { status, body })
            };

            tokio::time::timeout(self.request_timeout, exchange)
                .await
                .map_err(|_| {
                    EngineError::Unreachable(format!(
                        "request timed out after {}s",
                        self.request_timeout.as_secs()
                    ))
                })?
        })
    }

    fn stream(&self, request: EngineRequest) -> TransportFuture<'_, StreamingResponse> {
        Box::pin(async move {
            // No read timeout: these connections stay open until dropped.
            let res = self.dispatch(request).await?;
            let status = res.status();
            let body = res
                .into_body()
                .into_data_stream()
                .map_err(|e| EngineError::Unreachable(format!("stream interrupted: {}", e)));
            Ok(StreamingResponse {
                status,
                body: Box::pin(body),
            })
        })
    }
}

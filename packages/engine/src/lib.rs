//! Client for a container engine's HTTP control API.
//!
//! The engine listens on a local Unix socket (or a TCP port) and speaks
//! HTTP/1 with JSON bodies. This crate validates identifiers, builds the
//! versioned requests, maps failures onto [`EngineError`] and exposes the two
//! unbounded streams (container logs and engine events).
//!
//! # Usage
//!
//! ```ignore
//! use engine::{EngineClient, EngineConfig};
//!
//! let client = EngineClient::new(EngineConfig::default());
//! let containers = client.list_containers(true).await?;
//! ```

mod client;
mod config;
mod error;
pub mod logs;
pub mod transport;
mod types;
mod validate;

pub use client::EngineClient;
pub use config::{EngineConfig, EngineEndpoint};
pub use error::{EngineError, IdentifierKind};
pub use logs::{LogChunk, LogFrameCodec, LogStreamKind};
pub use transport::{
    ByteStream, EngineRequest, EngineResponse, HyperTransport, StreamingResponse, Transport,
    TransportFuture,
};
pub use types::{EventFilters, LogsOptions, NetworkOptions, RunOptions};
pub use validate::validate;

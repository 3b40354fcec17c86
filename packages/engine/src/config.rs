//! Engine connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Where the engine's control API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    /// Local Unix domain socket.
    Unix(PathBuf),
    /// Plain HTTP on `host:port`.
    Tcp(String),
}

impl EngineEndpoint {
    /// Parse `unix:///path`, `tcp://host:port`, `http://host:port` or a bare
    /// socket path.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        if let Some(path) = raw.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(EngineError::InvalidEndpoint(raw.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(authority) = raw
            .strip_prefix("tcp://")
            .or_else(|| raw.strip_prefix("http://"))
        {
            let authority = authority.trim_end_matches('/');
            if authority.is_empty() || authority.contains('/') {
                return Err(EngineError::InvalidEndpoint(raw.to_string()));
            }
            return Ok(Self::Tcp(authority.to_string()));
        }
        if raw.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(raw)));
        }
        Err(EngineError::InvalidEndpoint(raw.to_string()))
    }
}

impl Default for EngineEndpoint {
    fn default() -> Self {
        Self::Unix(PathBuf::from("/var/run/docker.sock"))
    }
}

impl std::fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            EngineEndpoint::Tcp(authority) => write!(f, "tcp://{}", authority),
        }
    }
}

/// Engine client configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Control API location.
    pub endpoint: EngineEndpoint,
    /// API version prefix, e.g. `v1.41`.
    pub api_version: String,
    /// Bound on ordinary (non-streaming) requests.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: EngineEndpoint::default(),
            api_version: "v1.41".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Set the endpoint.
    pub fn with_endpoint(mut self, endpoint: EngineEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the API version prefix.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the request timeout for non-streaming calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Prefix an API path with the configured version.
    pub(crate) fn versioned(&self, path: &str) -> String {
        format!("/{}{}", self.api_version.trim_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn parses_endpoints() -> Result<(), EngineError> {
        assert_eq!(
            EngineEndpoint::parse("unix:///var/run/docker.sock")?,
            EngineEndpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            EngineEndpoint::parse("/run/user/1000/podman/podman.sock")?,
            EngineEndpoint::Unix(PathBuf::from("/run/user/1000/podman/podman.sock"))
        );
        assert_eq!(
            EngineEndpoint::parse("tcp://127.0.0.1:2375")?,
            EngineEndpoint::Tcp("127.0.0.1:2375".into())
        );
        assert!(EngineEndpoint::parse("unix://").is_err());
        assert!(EngineEndpoint::parse("ftp://x").is_err());
        Ok(())
    }

    #[test]
    fn versioned_paths() {
        let config = EngineConfig::default().with_api_version("/v1.43/");
        assert_eq!(config.versioned("/events"), "/v1.43/events");
    }
}

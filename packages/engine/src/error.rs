//! Engine client errors.

use thiserror::Error;

/// Kinds of caller-supplied identifiers checked before they reach a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    ContainerId,
    ExecId,
    ImageName,
    ContainerName,
    VolumeName,
    NetworkName,
    JoinToken,
    ManagerAddress,
}

impl IdentifierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierKind::ContainerId => "container id",
            IdentifierKind::ExecId => "exec id",
            IdentifierKind::ImageName => "image name",
            IdentifierKind::ContainerName => "container name",
            IdentifierKind::VolumeName => "volume name",
            IdentifierKind::NetworkName => "network name",
            IdentifierKind::JoinToken => "join token",
            IdentifierKind::ManagerAddress => "manager address",
        }
    }
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the engine client.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input failed allow-list validation; no request was sent.
    #[error("invalid {kind} format: {value:?}")]
    InvalidIdentifier { kind: IdentifierKind, value: String },

    /// The control API answered with a non-success status.
    #[error("engine request failed: {message} (status code: {status})")]
    RequestFailed { status: u16, message: String },

    /// The engine could not be reached, timed out, or dropped the connection.
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    /// A success response lacked a field the operation depends on.
    #[error("unexpected engine response: {0}")]
    MalformedResponse(String),

    /// A multi-step operation created a resource and a later step failed.
    /// The resource is left in place.
    #[error("{resource} {id} was created but a later step failed: {source}")]
    PartiallyApplied {
        resource: &'static str,
        id: String,
        source: Box<EngineError>,
    },

    #[error("invalid engine endpoint: {0}")]
    InvalidEndpoint(String),
}

impl EngineError {
    /// HTTP status reported by the engine, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::RequestFailed { status, .. } => Some(*status),
            EngineError::PartiallyApplied { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Id of a resource left behind by a partially applied operation.
    pub fn created_id(&self) -> Option<&str> {
        match self {
            EngineError::PartiallyApplied { id, .. } => Some(id),
            _ => None,
        }
    }
}

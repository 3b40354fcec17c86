use engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Relay is already running")]
    AlreadyRunning,

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] db::StoreError),
}

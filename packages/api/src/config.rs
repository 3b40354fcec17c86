//! Runtime configuration read from the environment.

use std::time::Duration;

use actors::ExecutorConfig;
use db::StoreConfig;
use engine::{EngineConfig, EngineEndpoint};
use relay::RelayConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything needed to bring up the executor and the relay.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub executor: ExecutorConfig,
    pub relay: RelayConfig,
    pub store: StoreConfig,
}

impl RuntimeConfig {
    /// Read `DOCKER_HOST`, `DOCKER_API_VERSION`, `DOCKER_TIMEOUT_SECS`,
    /// `EXECUTOR_WORKERS`, `JOB_STORE` and `RELAY_POLL_MS`. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("DOCKER_HOST") {
            let endpoint = EngineEndpoint::parse(&host).map_err(|e| ConfigError::Invalid {
                name: "DOCKER_HOST",
                value: host.clone(),
                reason: e.to_string(),
            })?;
            config.engine = config.engine.with_endpoint(endpoint);
        }
        if let Some(version) = lookup("DOCKER_API_VERSION") {
            config.engine = config.engine.with_api_version(version);
        }
        if let Some(secs) = number(&lookup, "DOCKER_TIMEOUT_SECS")? {
            config.engine = config.engine.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(workers) = number(&lookup, "EXECUTOR_WORKERS")? {
            config.executor = config.executor.with_workers(workers as usize);
        }
        if let Some(store) = lookup("JOB_STORE") {
            config.store = StoreConfig::parse(&store);
        }
        if let Some(ms) = number(&lookup, "RELAY_POLL_MS")? {
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    name: "RELAY_POLL_MS",
                    value: ms.to_string(),
                    reason: "must be positive".into(),
                });
            }
            config.relay = config.relay.with_poll_interval(Duration::from_millis(ms));
        }

        config.executor = config.executor.with_topics(config.relay.topics());
        Ok(config)
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        })
}

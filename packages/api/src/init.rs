//! Server initialization.

use std::sync::Arc;

use actors::JobExecutor;
use db::KeyValueStore;
use engine::EngineClient;
use relay::{Broadcaster, TopicBus};

use crate::config::RuntimeConfig;

/// The pieces a host process serves from.
pub struct Runtime {
    pub client: EngineClient,
    pub store: Arc<dyn KeyValueStore>,
    pub bus: Arc<TopicBus>,
    pub executor: JobExecutor,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A fresh relay publishing on this runtime's bus and persisting into its
    /// store.
    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(self.client.clone(), self.bus.clone(), self.config.relay.clone())
            .with_store(self.store.clone())
    }

    /// Stop the executor's actors.
    pub async fn shutdown(self) -> Result<(), Box<dyn std::error::Error>> {
        self.executor.shutdown().await?;
        tracing::info!("Runtime stopped");
        Ok(())
    }
}

/// Open the store, connect the engine client and start the executor.
///
/// This should be called once at startup.
pub async fn init_runtime(config: RuntimeConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    tracing::info!("Initializing runtime (engine at {})", config.engine.endpoint);

    let store = config.store.open().await?;
    let client = EngineClient::new(config.engine.clone());
    init_with(config, client, store).await
}

/// [`init_runtime`] over an already built client and store.
pub async fn init_with(
    config: RuntimeConfig,
    client: EngineClient,
    store: Arc<dyn KeyValueStore>,
) -> Result<Runtime, Box<dyn std::error::Error>> {
    let bus = Arc::new(TopicBus::new());
    let executor = JobExecutor::start(
        config.executor.clone(),
        client.clone(),
        store.clone(),
        bus.clone(),
    )
    .await?;

    tracing::info!(
        "Runtime initialized with {} workers",
        config.executor.workers
    );
    Ok(Runtime {
        client,
        store,
        bus,
        executor,
        config,
    })
}

//! Relays the engine's unbounded streams onto the topic bus.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use db::{BroadcasterRepository, KeyValueStore};
use engine::{
    ByteStream, EngineClient, EngineError, EventFilters, IdentifierKind, LogChunk, LogFrameCodec,
};
use futures_util::{StreamExt, TryStreamExt};
use ops_core::{BusMessage, EngineEvent, Publisher, Topic, TopicScheme};
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::codec::{EventLine, EventLineCodec};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::state::{RelaySource, RunState};

/// What happened to one decoded frame.
enum Relayed {
    Published,
    Skipped,
    Ignored,
}

struct Shared {
    instance_id: String,
    state: Mutex<RunState>,
}

/// Cloneable handle to a [`Broadcaster`]: stop it from another task and
/// read its run state.
#[derive(Clone)]
pub struct BroadcasterHandle {
    shared: Arc<Shared>,
    states: Option<BroadcasterRepository>,
}

impl BroadcasterHandle {
    fn new(instance_id: String) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::idle(instance_id.clone())),
                instance_id,
            }),
            states: None,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.shared.instance_id
    }

    pub fn run_state(&self) -> RunState {
        self.update(|state| state.clone())
    }

    pub fn is_running(&self) -> bool {
        self.update(|state| state.is_running())
    }

    /// Ask the running loop to finish. The loop notices within one poll
    /// interval. Calling this on a relay that is not running does nothing.
    pub async fn stop(&self) {
        let stopped = self.update(|state| state.stop().then(|| state.clone()));
        if let Some(snapshot) = stopped {
            info!(
                instance = %self.instance_id(),
                published = snapshot.published,
                skipped = snapshot.skipped,
                "Relay stop requested"
            );
            self.persist(&snapshot).await;
        }
    }

    /// Load the last persisted snapshot of this instance.
    pub async fn persisted_state(&self) -> Result<Option<RunState>, RelayError> {
        match &self.states {
            Some(states) => Ok(states.get(self.instance_id()).await?),
            None => Ok(None),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn is_current(&self, run: u64) -> bool {
        self.update(|state| state.run == run && state.is_running())
    }

    async fn persist(&self, snapshot: &RunState) {
        let Some(states) = &self.states else {
            return;
        };
        match states.save(&snapshot.instance_id, snapshot).await {
            Ok(()) => debug!(instance = %snapshot.instance_id, status = %snapshot.status, "Saved relay state"),
            Err(e) => warn!(instance = %snapshot.instance_id, "Failed to save relay state: {}", e),
        }
    }
}

/// Reads one engine stream at a time and publishes every record it decodes.
///
/// `start` and `start_container_logs` run until the stream ends, fails, or
/// [`BroadcasterHandle::stop`] is called, so they belong on a dedicated task.
pub struct Broadcaster {
    client: EngineClient,
    publisher: Arc<dyn Publisher>,
    config: RelayConfig,
    topics: TopicScheme,
    handle: BroadcasterHandle,
}

impl Broadcaster {
    pub fn new(client: EngineClient, publisher: Arc<dyn Publisher>, config: RelayConfig) -> Self {
        let topics = config.topics();
        Self {
            client,
            publisher,
            config,
            topics,
            handle: BroadcasterHandle::new(format!("relay-{}", Ulid::new())),
        }
    }

    /// Persist run state into `store` under `broadcaster:{instance_id}`.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.handle.states =
            Some(BroadcasterRepository::new(store).with_retention(self.config.retention));
        self
    }

    pub fn handle(&self) -> BroadcasterHandle {
        self.handle.clone()
    }

    pub fn instance_id(&self) -> &str {
        self.handle.instance_id()
    }

    pub fn run_state(&self) -> RunState {
        self.handle.run_state()
    }

    pub async fn stop(&self) {
        self.handle.stop().await
    }

    /// Relay the engine event feed, narrowed by `filters`.
    ///
    /// Returns the final run state once the feed ends or the relay is
    /// stopped, or the error that ended the run.
    pub async fn start(&self, filters: EventFilters) -> Result<RunState, RelayError> {
        let run = self.begin(RelaySource::Events, filters.clone()).await?;
        info!(instance = %self.instance_id(), ?filters, "Relay started");

        let body = match self.client.stream_events(&filters).await {
            Ok(body) => body,
            Err(e) => return self.fail(run, e.into()).await,
        };
        let codec = EventLineCodec::with_max_length(self.config.max_line_length);
        let result = self.pump(run, body, codec, |line| self.relay_event(line)).await;
        self.finish(run, result).await
    }

    /// Relay one container's followed log output onto its private logs
    /// topic.
    pub async fn start_container_logs(&self, container_id: &str) -> Result<RunState, RelayError> {
        engine::validate(IdentifierKind::ContainerId, container_id)?;
        let source = RelaySource::ContainerLogs {
            container_id: container_id.to_string(),
        };
        let run = self.begin(source, EventFilters::new()).await?;
        info!(instance = %self.instance_id(), container = %container_id, "Log relay started");

        let body = match self.client.stream_container_logs(container_id).await {
            Ok(body) => body,
            Err(e) => return self.fail(run, e.into()).await,
        };
        let topic = self.topics.container_logs(container_id);
        let result = self
            .pump(run, body, LogFrameCodec::new(), |chunk| {
                self.relay_log(&topic, container_id, chunk)
            })
            .await;
        self.finish(run, result).await
    }

    async fn begin(&self, source: RelaySource, filters: EventFilters) -> Result<u64, RelayError> {
        let (run, snapshot) = self.handle.update(|state| {
            if state.is_running() {
                return Err(RelayError::AlreadyRunning);
            }
            let run = state.begin(source, filters);
            Ok((run, state.clone()))
        })?;
        self.handle.persist(&snapshot).await;
        Ok(run)
    }

    async fn pump<D, F>(
        &self,
        run: u64,
        body: ByteStream,
        decoder: D,
        mut relay: F,
    ) -> Result<(), RelayError>
    where
        D: Decoder<Error = io::Error> + Unpin,
        F: FnMut(D::Item) -> Relayed,
    {
        let reader = StreamReader::new(body.map_err(io::Error::other));
        let mut frames = FramedRead::new(reader, decoder);

        while self.handle.is_current(run) {
            let item = match tokio::time::timeout(self.config.poll_interval, frames.next()).await {
                Err(_) => continue,
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(EngineError::Unreachable(e.to_string()).into()),
                Ok(Some(Ok(item))) => item,
            };

            let outcome = relay(item);
            self.handle.update(|state| {
                if state.run != run {
                    return;
                }
                match outcome {
                    Relayed::Published => state.published += 1,
                    Relayed::Skipped => state.skipped += 1,
                    Relayed::Ignored => {}
                }
            });
        }
        Ok(())
    }

    fn relay_event(&self, line: EventLine) -> Relayed {
        let bytes = match line {
            EventLine::Line(bytes) => bytes,
            EventLine::Oversized => {
                debug!(instance = %self.instance_id(), "Dropped oversized event line");
                return Relayed::Skipped;
            }
        };
        if bytes.trim_ascii().is_empty() {
            return Relayed::Ignored;
        }
        let Some(event) = EngineEvent::from_line(&bytes) else {
            debug!(
                instance = %self.instance_id(),
                line = %String::from_utf8_lossy(&bytes),
                "Skipped undecodable event line"
            );
            return Relayed::Skipped;
        };

        let message = BusMessage::engine_event(&event);
        for topic in self.topics.event_topics(&event) {
            self.publisher.publish(&topic, message.clone());
        }
        Relayed::Published
    }

    fn relay_log(&self, topic: &Topic, container_id: &str, chunk: LogChunk) -> Relayed {
        let message = BusMessage::container_log(container_id, chunk.stream.as_str(), &chunk.text());
        self.publisher.publish(topic, message);
        Relayed::Published
    }

    async fn finish(&self, run: u64, result: Result<(), RelayError>) -> Result<RunState, RelayError> {
        if let Err(e) = result {
            return self.fail(run, e).await;
        }
        let snapshot = self.handle.update(|state| {
            if state.run == run {
                state.stop();
            }
            state.clone()
        });
        info!(
            instance = %self.instance_id(),
            published = snapshot.published,
            skipped = snapshot.skipped,
            "Relay stopped"
        );
        self.handle.persist(&snapshot).await;
        Ok(snapshot)
    }

    async fn fail(&self, run: u64, err: RelayError) -> Result<RunState, RelayError> {
        let failed = self.handle.update(|state| {
            if state.run == run && state.is_running() {
                state.fail(err.to_string());
                Some(state.clone())
            } else {
                None
            }
        });
        let Some(snapshot) = failed else {
            // Stopped while the read was failing; the stop wins.
            return Ok(self.handle.run_state());
        };
        error!(instance = %self.instance_id(), error = %err, "Relay stream failed");
        self.handle.persist(&snapshot).await;
        Err(err)
    }
}

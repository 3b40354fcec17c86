//! Relay run state.

use chrono::{DateTime, Utc};
use engine::EventFilters;
use serde::{Deserialize, Serialize};

/// Lifecycle of one relay instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Stopped,
    Errored,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
            RunStatus::Errored => "errored",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run is reading from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelaySource {
    #[default]
    Events,
    ContainerLogs { container_id: String },
}

/// Snapshot of a relay instance, persisted under `broadcaster:{instance_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub instance_id: String,
    pub status: RunStatus,
    pub source: RelaySource,
    pub filters: EventFilters,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Records published in the current run.
    pub published: u64,
    /// Chunks dropped as undecodable in the current run.
    pub skipped: u64,
    /// Number of runs started so far.
    #[serde(default)]
    pub run: u64,
}

impl RunState {
    pub fn idle(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: RunStatus::Idle,
            source: RelaySource::Events,
            filters: EventFilters::new(),
            started_at: None,
            stopped_at: None,
            error: None,
            published: 0,
            skipped: 0,
            run: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Enter Running for a new run, clearing the previous run's outcome.
    pub(crate) fn begin(&mut self, source: RelaySource, filters: EventFilters) -> u64 {
        self.run += 1;
        self.status = RunStatus::Running;
        self.source = source;
        self.filters = filters;
        self.started_at = Some(Utc::now());
        self.stopped_at = None;
        self.error = None;
        self.published = 0;
        self.skipped = 0;
        self.run
    }

    /// Running → Stopped. Returns false (and changes nothing) otherwise.
    pub(crate) fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = RunStatus::Stopped;
        self.stopped_at = Some(Utc::now());
        true
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Errored;
        self.error = Some(error.into());
        self.stopped_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn stop_only_applies_to_running() {
        let mut state = RunState::idle("r1");
        assert!(!state.stop());
        assert_eq!(state.stopped_at, None);

        state.begin(RelaySource::Events, EventFilters::new());
        assert!(state.stop());
        let stamped = state.stopped_at;
        assert!(stamped.is_some());

        assert!(!state.stop());
        assert_eq!(state.stopped_at, stamped);
    }

    #[test]
    fn begin_resets_previous_outcome() {
        let mut state = RunState::idle("r1");
        state.begin(RelaySource::Events, EventFilters::new());
        state.published = 3;
        state.fail("socket closed");

        let run = state.begin(
            RelaySource::ContainerLogs {
                container_id: "abc".to_string(),
            },
            EventFilters::new(),
        );
        assert_eq!(run, 2);
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.error, None);
        assert_eq!(state.published, 0);
        assert_eq!(state.stopped_at, None);
    }

    #[test]
    fn serializes_lowercase_status() -> Result<(), serde_json::Error> {
        let state = RunState::idle("r1");
        let value = serde_json::to_value(&state)?;
        assert_eq!(value["status"], "idle");
        assert_eq!(value["source"]["kind"], "events");
        Ok(())
    }
}

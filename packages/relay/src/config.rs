use std::time::Duration;

use ops_core::TopicScheme;

use crate::codec::DEFAULT_MAX_LINE_LENGTH;

/// Relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Root of the event topic hierarchy.
    pub root_topic: String,
    /// Prefix of the private per-container topics.
    pub container_topic_prefix: String,
    /// Longest wait for a single read before the stop flag is checked again.
    pub poll_interval: Duration,
    /// How long persisted run state is kept.
    pub retention: Duration,
    /// Lines longer than this are dropped.
    pub max_line_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let topics = TopicScheme::default();
        Self {
            root_topic: topics.events_root,
            container_topic_prefix: topics.container_prefix,
            poll_interval: Duration::from_secs(1),
            retention: Duration::from_secs(24 * 60 * 60),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl RelayConfig {
    pub fn with_root_topic(mut self, root: impl Into<String>) -> Self {
        self.root_topic = root.into();
        self
    }

    pub fn with_container_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.container_topic_prefix = prefix.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Topic names derived from this config.
    pub fn topics(&self) -> TopicScheme {
        let mut topics = TopicScheme::default().with_events_root(&self.root_topic);
        topics.container_prefix = self.container_topic_prefix.clone();
        topics
    }
}

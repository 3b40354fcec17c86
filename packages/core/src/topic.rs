//! Publish/subscribe addressing.

use serde::{Deserialize, Serialize};

use crate::{EngineEvent, JobId};

/// Who may subscribe to a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    /// Restricted to authorized subscribers (per-container and per-job feeds).
    Private,
}

/// A named channel in the publish/subscribe addressing scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    name: String,
    visibility: Visibility,
}

impl Topic {
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
        }
    }

    pub fn private(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Private,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Topic names used by the relay and the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicScheme {
    /// Root of the engine event hierarchy.
    pub events_root: String,
    /// Prefix of the per-container topics.
    pub container_prefix: String,
    /// Shared topic for job notifications.
    pub operations: String,
    /// Prefix of the per-job topics.
    pub job_prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self {
            events_root: "docker-events".to_string(),
            container_prefix: "docker-container".to_string(),
            operations: "docker-operations".to_string(),
            job_prefix: "docker-job".to_string(),
        }
    }
}

impl TopicScheme {
    /// Set the root of the event hierarchy.
    pub fn with_events_root(mut self, root: impl Into<String>) -> Self {
        self.events_root = root.into();
        self
    }

    /// Every topic an engine event is published on.
    ///
    /// Always contains the root topic; adds the type and type+action topics
    /// when those fields are present, and the private container topic for
    /// container events carrying an actor id.
    pub fn event_topics(&self, event: &EngineEvent) -> Vec<Topic> {
        let mut topics = vec![Topic::public(&self.events_root)];

        if let Some(kind) = event.kind() {
            topics.push(Topic::public(format!("{}.{}", self.events_root, kind)));

            if let Some(action) = event.action() {
                topics.push(Topic::public(format!(
                    "{}.{}.{}",
                    self.events_root, kind, action
                )));
            }

            if kind == "container"
                && let Some(actor_id) = event.actor_id()
            {
                topics.push(self.container(actor_id));
            }
        }

        topics
    }

    /// Private topic for one container.
    pub fn container(&self, container_id: &str) -> Topic {
        Topic::private(format!("{}.{}", self.container_prefix, container_id))
    }

    /// Private topic carrying one container's log output.
    pub fn container_logs(&self, container_id: &str) -> Topic {
        Topic::private(format!("{}.{}.logs", self.container_prefix, container_id))
    }

    /// Topics a job notification is published on: the job's own private
    /// topic and the shared operations topic.
    pub fn job_topics(&self, job_id: JobId) -> [Topic; 2] {
        [
            Topic::private(format!("{}.{}", self.job_prefix, job_id)),
            Topic::public(&self.operations),
        ]
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn event(raw: &str) -> Option<EngineEvent> {
        EngineEvent::from_line(raw.as_bytes())
    }

    #[test]
    fn container_event_fans_out_to_four_topics() {
        let scheme = TopicScheme::default();
        let topics = event(r#"{"Type":"container","Action":"start","Actor":{"ID":"abc123"}}"#)
            .map(|e| scheme.event_topics(&e))
            .unwrap_or_default();

        let names: Vec<&str> = topics.iter().map(Topic::name).collect();
        assert_eq!(
            names,
            vec![
                "docker-events",
                "docker-events.container",
                "docker-events.container.start",
                "docker-container.abc123",
            ]
        );
        assert!(topics[3].is_private());
        assert!(topics[..3].iter().all(|t| !t.is_private()));
    }

    #[test]
    fn actor_topic_only_for_containers() {
        let scheme = TopicScheme::default();
        let topics = event(r#"{"Type":"image","Action":"pull","Actor":{"ID":"nginx"}}"#)
            .map(|e| scheme.event_topics(&e))
            .unwrap_or_default();
        assert_eq!(topics.len(), 3);
    }

    #[test]
    fn untyped_event_goes_to_root_only() {
        let scheme = TopicScheme::default();
        let topics = event(r#"{"status":"weird"}"#)
            .map(|e| scheme.event_topics(&e))
            .unwrap_or_default();
        assert_eq!(topics, vec![Topic::public("docker-events")]);
    }

    #[test]
    fn job_topics() {
        let scheme = TopicScheme::default();
        let id = JobId::new();
        let [own, shared] = scheme.job_topics(id);
        assert_eq!(own.name(), format!("docker-job.{}", id));
        assert!(own.is_private());
        assert_eq!(shared.name(), "docker-operations");
    }
}

//! Option bags accepted by the composite engine calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Options for creating and starting a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub cmd: Option<Vec<String>>,
    pub env: Option<Vec<String>>,
    /// Container port to host port, published as `{port}/tcp`.
    pub ports: BTreeMap<String, String>,
    /// Host path to container path.
    pub volumes: BTreeMap<String, String>,
}

impl RunOptions {
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.env.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    pub fn with_port(mut self, container_port: impl ToString, host_port: impl ToString) -> Self {
        self.ports
            .insert(container_port.to_string(), host_port.to_string());
        self
    }

    pub fn with_volume(mut self, host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        self.volumes.insert(host_path.into(), container_path.into());
        self
    }

    /// Body of `POST /containers/create`.
    pub fn create_body(&self, image: &str) -> Value {
        let mut host_config = Map::new();
        let mut body = Map::new();
        body.insert("Image".into(), Value::String(image.to_string()));

        if let Some(cmd) = self.cmd.as_ref().filter(|c| !c.is_empty()) {
            body.insert("Cmd".into(), json!(cmd));
        }
        if let Some(env) = self.env.as_ref().filter(|e| !e.is_empty()) {
            body.insert("Env".into(), json!(env));
        }

        if !self.ports.is_empty() {
            let mut bindings = Map::new();
            let mut exposed = Map::new();
            for (container_port, host_port) in &self.ports {
                let key = format!("{}/tcp", container_port);
                bindings.insert(key.clone(), json!([{ "HostPort": host_port }]));
                exposed.insert(key, json!({}));
            }
            host_config.insert("PortBindings".into(), Value::Object(bindings));
            body.insert("ExposedPorts".into(), Value::Object(exposed));
        }

        if !self.volumes.is_empty() {
            let binds: Vec<String> = self
                .volumes
                .iter()
                .map(|(host, container)| format!("{}:{}", host, container))
                .collect();
            host_config.insert("Binds".into(), json!(binds));
        }

        body.insert("HostConfig".into(), Value::Object(host_config));
        Value::Object(body)
    }
}

/// Options for creating a network. `driver` is lifted out of the map; the
/// rest become driver options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    pub driver: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, String>,
}

impl NetworkOptions {
    pub fn create_body(&self, name: &str) -> Value {
        let mut body = json!({ "Name": name, "CheckDuplicate": true });
        if let Some(driver) = self.driver.as_deref().filter(|d| !d.is_empty()) {
            body["Driver"] = json!(driver);
        }
        if !self.options.is_empty() {
            body["Options"] = json!(self.options);
        }
        body
    }
}

/// Options for a non-following log read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogsOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub tail: u32,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            tail: 100,
        }
    }
}

/// Engine event filters: `{key: [values]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventFilters(BTreeMap<String, Vec<String>>);

impl EventFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value under `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Build from `key=value` strings. Returns the first malformed pair as
    /// the error.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filters = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                    filters = filters.with(key.trim(), value.trim());
                }
                _ => return Err(pair.to_string()),
            }
        }
        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// JSON encoding used for the `filters` query parameter.
    pub fn to_query_value(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn run_body_carries_ports_and_binds() {
        let options = RunOptions::default()
            .with_cmd(["nginx", "-g", "daemon off;"])
            .with_env("MODE=prod")
            .with_port(80, 8080)
            .with_volume("/srv/www", "/usr/share/nginx/html");
        let body = options.create_body("nginx");

        assert_eq!(body["Image"], "nginx");
        assert_eq!(body["Cmd"][2], "daemon off;");
        assert_eq!(body["Env"], json!(["MODE=prod"]));
        assert_eq!(body["HostConfig"]["PortBindings"]["80/tcp"][0]["HostPort"], "8080");
        assert_eq!(body["ExposedPorts"]["80/tcp"], json!({}));
        assert_eq!(
            body["HostConfig"]["Binds"],
            json!(["/srv/www:/usr/share/nginx/html"])
        );
    }

    #[test]
    fn minimal_run_body() {
        let body = RunOptions::default().create_body("alpine");
        assert_eq!(body, json!({ "Image": "alpine", "HostConfig": {} }));
    }

    #[test]
    fn network_options_lift_driver() -> Result<(), serde_json::Error> {
        let options: NetworkOptions =
            serde_json::from_value(json!({ "driver": "bridge", "com.docker.network.bridge.name": "br0" }))?;
        let body = options.create_body("backend");
        assert_eq!(body["Driver"], "bridge");
        assert_eq!(body["CheckDuplicate"], true);
        assert_eq!(body["Options"]["com.docker.network.bridge.name"], "br0");
        assert!(body["Options"].get("driver").is_none());
        Ok(())
    }

    #[test]
    fn filters_from_pairs() {
        let filters = EventFilters::from_pairs(["type=container", "event=start", "type=image"])
            .expect("valid pairs");
        assert_eq!(
            filters.get("type"),
            Some(&["container".to_string(), "image".to_string()][..])
        );
        assert_eq!(
            filters.to_query_value(),
            r#"{"event":["start"],"type":["container","image"]}"#
        );
        assert_eq!(EventFilters::from_pairs(["novalue="]), Err("novalue=".to_string()));
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::Method;
use serde_json::{Map, Value, json};

use crate::config::EngineConfig;
use crate::error::{EngineError, IdentifierKind};
use crate::logs::demux_text;
use crate::transport::{
    ByteStream, EngineRequest, EngineResponse, HyperTransport, StreamingResponse, Transport,
};
use crate::types::{EventFilters, LogsOptions, NetworkOptions, RunOptions};
use crate::validate::validate;

const SWARM_LISTEN_ADDR: &str = "0.0.0.0:2377";

/// Typed client for the container engine's control API.
///
/// Every caller-supplied identifier is checked before a request is built, so
/// an invalid one never reaches the transport.
#[derive(Clone)]
pub struct EngineClient {
    transport: Arc<dyn Transport>,
    config: EngineConfig,
}

impl EngineClient {
    /// Client over the configured socket or TCP endpoint.
    pub fn new(config: EngineConfig) -> Self {
        let transport = Arc::new(HyperTransport::new(&config));
        Self { transport, config }
    }

    /// Client over a caller-provided transport.
    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> EngineRequest {
        EngineRequest::new(method, self.config.versioned(path))
    }

    /// Send and require a 2xx status.
    async fn call(&self, request: EngineRequest, context: &str) -> Result<EngineResponse, EngineError> {
        let response = self.transport.send(request).await?;
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(failure(response.status.as_u16(), &response.body, context))
        }
    }

    async fn call_json(&self, request: EngineRequest, context: &str) -> Result<Value, EngineError> {
        let response = self.call(request, context).await?;
        parse_json(&response.body)
    }

    async fn open_stream(&self, request: EngineRequest, context: &str) -> Result<ByteStream, EngineError> {
        let StreamingResponse { status, body } = self.transport.stream(request).await?;
        if status.is_success() {
            return Ok(body);
        }
        let error_body = body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, EngineError>(acc)
            })
            .await
            .unwrap_or_default();
        Err(failure(status.as_u16(), &error_body, context))
    }

    // ---- containers ----

    pub async fn list_containers(&self, all: bool) -> Result<Value, EngineError> {
        let request = self.request(Method::GET, "/containers/json").query("all", all);
        self.call_json(request, "Failed to list containers").await
    }

    pub async fn start_container(&self, id: &str) -> Result<Value, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;
        let request = self.request(Method::POST, &format!("/containers/{}/start", id));
        self.call(request, &format!("Failed to start container {}", id))
            .await?;
        Ok(ack(format!("Container {} started successfully", id)))
    }

    pub async fn stop_container(&self, id: &str, timeout_secs: u32) -> Result<Value, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;
        let request = self
            .request(Method::POST, &format!("/containers/{}/stop", id))
            .query("t", timeout_secs);
        self.call(request, &format!("Failed to stop container {}", id))
            .await?;
        Ok(ack(format!("Container {} stopped successfully", id)))
    }

    pub async fn restart_container(&self, id: &str, timeout_secs: u32) -> Result<Value, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;
        let request = self
            .request(Method::POST, &format!("/containers/{}/restart", id))
            .query("t", timeout_secs);
        self.call(request, &format!("Failed to restart container {}", id))
            .await?;
        Ok(ack(format!("Container {} restarted successfully", id)))
    }

    pub async fn remove_container(&self, id: &str, force: bool, volumes: bool) -> Result<Value, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;
        let request = self
            .request(Method::DELETE, &format!("/containers/{}", id))
            .query("force", force)
            .query("v", volumes);
        self.call(request, &format!("Failed to remove container {}", id))
            .await?;
        Ok(ack(format!("Container {} removed successfully", id)))
    }

    /// Buffered log read. Multiplexed frames are decoded to plain text.
    pub async fn container_logs(&self, id: &str, options: LogsOptions) -> Result<Value, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;
        let request = self
            .request(Method::GET, &format!("/containers/{}/logs", id))
            .query("stdout", options.stdout)
            .query("stderr", options.stderr)
            .query("tail", options.tail);
        let response = self
            .call(request, &format!("Failed to get logs for container {}", id))
            .await?;
        Ok(json!({ "logs": demux_text(&response.body) }))
    }

    /// Run a command in a running container: create an exec instance, then
    /// start it. A failed start leaves the exec instance behind and reports
    /// its id.
    pub async fn exec(&self, id: &str, cmd: &[String], detach: bool) -> Result<Value, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;

        let create = self
            .request(Method::POST, &format!("/containers/{}/exec", id))
            .json(json!({
                "AttachStdin": false,
                "AttachStdout": true,
                "AttachStderr": true,
                "Tty": false,
                "Cmd": cmd,
                "Detach": detach,
            }));
        let created = self
            .call_json(create, &format!("Failed to create exec instance for container {}", id))
            .await?;
        let exec_id = created_id(&created, "exec instance")?;
        validate(IdentifierKind::ExecId, &exec_id)?;

        let start = self
            .request(Method::POST, &format!("/exec/{}/start", exec_id))
            .json(json!({ "Detach": detach, "Tty": false }));
        let response = self
            .call(start, &format!("Failed to execute command in container {}", id))
            .await
            .map_err(|source| EngineError::PartiallyApplied {
                resource: "exec instance",
                id: exec_id.clone(),
                source: Box::new(source),
            })?;

        if detach {
            Ok(ack(format!("Command executed in background in container {}", id)))
        } else {
            Ok(json!({ "output": demux_text(&response.body) }))
        }
    }

    /// Create a container from `image` and start it. No rollback runs if the
    /// start fails; the created container id is carried by the error.
    pub async fn run_container(
        &self,
        image: &str,
        name: Option<&str>,
        options: &RunOptions,
    ) -> Result<Value, EngineError> {
        let image = validate(IdentifierKind::ImageName, image)?;
        let name = name
            .map(|n| validate(IdentifierKind::ContainerName, n))
            .transpose()?;

        let mut create = self
            .request(Method::POST, "/containers/create")
            .json(options.create_body(image));
        if let Some(name) = name {
            create = create.query("name", name);
        }
        let created = self
            .call_json(create, &format!("Failed to create container from image {}", image))
            .await?;
        let container_id = created_id(&created, "container")?;
        tracing::debug!("created container {} from {}", container_id, image);

        let start = self.request(Method::POST, &format!("/containers/{}/start", container_id));
        self.call(
            start,
            &format!("Failed to start newly created container {}", container_id),
        )
        .await
        .map_err(|source| EngineError::PartiallyApplied {
            resource: "container",
            id: container_id.clone(),
            source: Box::new(source),
        })?;

        Ok(json!({
            "success": true,
            "message": "Container created and started successfully",
            "container_id": container_id,
        }))
    }

    // ---- images ----

    pub async fn list_images(&self) -> Result<Value, EngineError> {
        let request = self.request(Method::GET, "/images/json");
        self.call_json(request, "Failed to list images").await
    }

    /// Pull an image. `details` carries the engine's progress output.
    pub async fn pull_image(&self, image: &str) -> Result<Value, EngineError> {
        let image = validate(IdentifierKind::ImageName, image)?;
        let request = self
            .request(Method::POST, "/images/create")
            .query("fromImage", image);
        let response = self
            .call(request, &format!("Failed to pull image {}", image))
            .await?;
        Ok(json!({
            "success": true,
            "message": format!("Image {} pulled successfully", image),
            "details": String::from_utf8_lossy(&response.body),
        }))
    }

    pub async fn remove_image(&self, image: &str, force: bool) -> Result<Value, EngineError> {
        let image = validate(IdentifierKind::ImageName, image)?;
        let request = self
            .request(Method::DELETE, &format!("/images/{}", image))
            .query("force", force);
        let details = self
            .call_json(request, &format!("Failed to remove image {}", image))
            .await?;
        Ok(json!({
            "success": true,
            "message": format!("Image {} removed successfully", image),
            "details": details,
        }))
    }

    // ---- volumes ----

    pub async fn list_volumes(&self) -> Result<Value, EngineError> {
        let request = self.request(Method::GET, "/volumes");
        self.call_json(request, "Failed to list volumes").await
    }

    pub async fn create_volume(
        &self,
        name: &str,
        driver_opts: &BTreeMap<String, String>,
    ) -> Result<Value, EngineError> {
        let name = validate(IdentifierKind::VolumeName, name)?;
        let mut body = json!({ "Name": name, "Driver": "local" });
        if !driver_opts.is_empty() {
            body["DriverOpts"] = json!(driver_opts);
        }
        let request = self.request(Method::POST, "/volumes/create").json(body);
        self.call_json(request, &format!("Failed to create volume {}", name))
            .await
    }

    pub async fn remove_volume(&self, name: &str, force: bool) -> Result<Value, EngineError> {
        let name = validate(IdentifierKind::VolumeName, name)?;
        let request = self
            .request(Method::DELETE, &format!("/volumes/{}", name))
            .query("force", force);
        self.call(request, &format!("Failed to remove volume {}", name))
            .await?;
        Ok(ack(format!("Volume {} removed successfully", name)))
    }

    // ---- networks ----

    pub async fn list_networks(&self) -> Result<Value, EngineError> {
        let request = self.request(Method::GET, "/networks");
        self.call_json(request, "Failed to list networks").await
    }

    pub async fn create_network(&self, name: &str, options: &NetworkOptions) -> Result<Value, EngineError> {
        let name = validate(IdentifierKind::NetworkName, name)?;
        let request = self
            .request(Method::POST, "/networks/create")
            .json(options.create_body(name));
        self.call_json(request, &format!("Failed to create network {}", name))
            .await
    }

    pub async fn remove_network(&self, name: &str) -> Result<Value, EngineError> {
        let name = validate(IdentifierKind::NetworkName, name)?;
        let request = self.request(Method::DELETE, &format!("/networks/{}", name));
        self.call(request, &format!("Failed to remove network {}", name))
            .await?;
        Ok(ack(format!("Network {} removed successfully", name)))
    }

    // ---- swarm ----

    /// Initialize a swarm. `options` are merged over the default listen and
    /// advertise addresses.
    pub async fn init_swarm(&self, options: &Map<String, Value>) -> Result<Value, EngineError> {
        let mut body = Map::new();
        body.insert("ListenAddr".into(), json!(SWARM_LISTEN_ADDR));
        body.insert("AdvertiseAddr".into(), json!(SWARM_LISTEN_ADDR));
        for (key, value) in options {
            body.insert(key.clone(), value.clone());
        }
        let request = self
            .request(Method::POST, "/swarm/init")
            .json(Value::Object(body));
        let response = self.call(request, "Failed to initialize swarm").await?;

        // The engine answers with a bare JSON string.
        let swarm_id = match serde_json::from_slice::<Value>(&response.body) {
            Ok(Value::String(id)) => id,
            _ => String::from_utf8_lossy(&response.body).trim().to_string(),
        };
        Ok(json!({
            "success": true,
            "message": "Swarm initialized successfully",
            "swarm_id": swarm_id,
        }))
    }

    pub async fn join_swarm(&self, token: &str, manager_addr: &str) -> Result<Value, EngineError> {
        let token = validate(IdentifierKind::JoinToken, token)?;
        let manager_addr = validate(IdentifierKind::ManagerAddress, manager_addr)?;
        let request = self.request(Method::POST, "/swarm/join").json(json!({
            "JoinToken": token,
            "RemoteAddrs": [manager_addr],
            "ListenAddr": SWARM_LISTEN_ADDR,
        }));
        self.call(request, "Failed to join swarm").await?;
        Ok(ack("Successfully joined the swarm"))
    }

    pub async fn leave_swarm(&self, force: bool) -> Result<Value, EngineError> {
        let request = self
            .request(Method::POST, "/swarm/leave")
            .query("force", force);
        self.call(request, "Failed to leave swarm").await?;
        Ok(ack("Successfully left the swarm"))
    }

    pub async fn list_swarm_nodes(&self) -> Result<Value, EngineError> {
        let request = self.request(Method::GET, "/nodes");
        self.call_json(request, "Failed to list swarm nodes").await
    }

    pub async fn list_swarm_services(&self) -> Result<Value, EngineError> {
        let request = self.request(Method::GET, "/services");
        self.call_json(request, "Failed to list swarm services").await
    }

    // ---- streams ----

    /// Follow a container's logs. The returned stream stays open until the
    /// container exits or the stream is dropped.
    pub async fn stream_container_logs(&self, id: &str) -> Result<ByteStream, EngineError> {
        let id = validate(IdentifierKind::ContainerId, id)?;
        let request = self
            .request(Method::GET, &format!("/containers/{}/logs", id))
            .query("follow", true)
            .query("stdout", true)
            .query("stderr", true)
            .query("timestamps", true);
        self.open_stream(request, &format!("Failed to stream logs for container {}", id))
            .await
    }

    /// Follow the engine's event feed as newline-delimited JSON.
    pub async fn stream_events(&self, filters: &EventFilters) -> Result<ByteStream, EngineError> {
        let mut request = self.request(Method::GET, "/events");
        if !filters.is_empty() {
            request = request.query("filters", filters.to_query_value());
        }
        self.open_stream(request, "Failed to stream engine events").await
    }
}

fn ack(message: impl Into<String>) -> Value {
    json!({ "success": true, "message": message.into() })
}

/// Success bodies: empty means an empty object, anything else must be JSON.
fn parse_json(body: &Bytes) -> Result<Value, EngineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| EngineError::MalformedResponse(e.to_string()))
}

fn failure(status: u16, body: &[u8], context: &str) -> EngineError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| context.to_string());
    tracing::debug!("{} (status {}): {}", context, status, message);
    EngineError::RequestFailed { status, message }
}

fn created_id(body: &Value, resource: &str) -> Result<String, EngineError> {
    body.get("Id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::MalformedResponse(format!("{} create response has no Id", resource)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn failure_prefers_engine_message() {
        let err = failure(404, br#"{"message":"No such container: abc"}"#, "Failed to start container abc");
        assert!(matches!(
            err,
            EngineError::RequestFailed { status: 404, ref message } if message == "No such container: abc"
        ));

        let err = failure(500, b"<html>oops</html>", "Failed to list images");
        assert!(matches!(
            err,
            EngineError::RequestFailed { status: 500, ref message } if message == "Failed to list images"
        ));
    }

    #[test]
    fn empty_success_body_is_empty_object() -> Result<(), EngineError> {
        assert_eq!(parse_json(&Bytes::new())?, json!({}));
        assert!(matches!(
            parse_json(&Bytes::from_static(b"not json")),
            Err(EngineError::MalformedResponse(_))
        ));
        Ok(())
    }
}

//! The closed table of operations that can be submitted by name.
//!
//! Each row names an operation, declares its positional parameters and binds
//! a JSON parameter list into a typed [`OperationCall`]. Dispatch is a table
//! lookup; nothing is resolved by reflection.

use std::collections::{BTreeMap, HashMap};

use engine::{
    EngineClient, EngineError, IdentifierKind, LogsOptions, NetworkOptions, RunOptions, validate,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ExecutorError;

/// JSON kind a positional parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Bool,
    Integer,
    StringList,
    Object,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Bool => "boolean",
            ParamKind::Integer => "non-negative integer",
            ParamKind::StringList => "list of strings",
            ParamKind::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Bool => value.is_boolean(),
            ParamKind::Integer => value
                .as_u64()
                .is_some_and(|n| u32::try_from(n).is_ok()),
            ParamKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// One positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
    }
}

type Binder = fn(&Params<'_>) -> Result<OperationCall, ExecutorError>;

/// A supported operation: name, parameter signature and binder.
pub struct OperationSpec {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    binder: Binder,
}

impl std::fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl OperationSpec {
    /// Check arity and kinds, then build the typed call. Identifiers are
    /// validated here, so a bound call never carries an invalid one.
    pub fn bind(&self, params: &[Value]) -> Result<OperationCall, ExecutorError> {
        if params.len() > self.params.len() {
            return Err(self.invalid(format!(
                "expected at most {} parameters, got {}",
                self.params.len(),
                params.len()
            )));
        }

        for (index, spec) in self.params.iter().enumerate() {
            match params.get(index).filter(|v| !v.is_null()) {
                Some(value) if !spec.kind.matches(value) => {
                    return Err(self.invalid(format!(
                        "parameter {} ({}) must be a {}",
                        index,
                        spec.name,
                        spec.kind.as_str()
                    )));
                }
                None if spec.required => {
                    return Err(self.invalid(format!(
                        "missing required parameter {} ({})",
                        index, spec.name
                    )));
                }
                _ => {}
            }
        }

        (self.binder)(&Params {
            operation: self.name,
            values: params,
        })
    }

    /// Human-readable signature, e.g. `stopContainer(id: string, timeout?: non-negative integer)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, marker, p.kind.as_str())
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    fn invalid(&self, reason: String) -> ExecutorError {
        ExecutorError::InvalidParameters {
            operation: self.name.to_string(),
            reason,
        }
    }
}

/// Positional parameters whose kinds have already been checked. `null`
/// reads as absent.
struct Params<'a> {
    operation: &'static str,
    values: &'a [Value],
}

impl Params<'_> {
    fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).filter(|v| !v.is_null())
    }

    fn string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    fn id(&self, index: usize, kind: IdentifierKind) -> Result<String, ExecutorError> {
        let value = self.string(index).unwrap_or_default();
        Ok(validate(kind, value)?.to_string())
    }

    fn flag(&self, index: usize, default: bool) -> bool {
        self.get(index).and_then(Value::as_bool).unwrap_or(default)
    }

    fn number(&self, index: usize, default: u32) -> u32 {
        self.get(index)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(default)
    }

    fn strings(&self, index: usize) -> Vec<String> {
        self.get(index)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn object(&self, index: usize) -> Map<String, Value> {
        self.get(index)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    fn decode<T: DeserializeOwned + Default>(&self, index: usize) -> Result<T, ExecutorError> {
        match self.get(index) {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| ExecutorError::InvalidParameters {
                    operation: self.operation.to_string(),
                    reason: format!("parameter {}: {}", index, e),
                })
            }
            None => Ok(T::default()),
        }
    }
}

/// A bound, validated operation ready to run against the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationCall {
    ListContainers { all: bool },
    ListImages,
    StartContainer { id: String },
    StopContainer { id: String, timeout: u32 },
    RestartContainer { id: String, timeout: u32 },
    RemoveContainer { id: String, force: bool, volumes: bool },
    ContainerLogs { id: String, options: LogsOptions },
    Exec { id: String, cmd: Vec<String>, detach: bool },
    RunContainer { image: String, name: Option<String>, options: RunOptions },
    PullImage { image: String },
    RemoveImage { image: String, force: bool },
    ListVolumes,
    CreateVolume { name: String, driver_opts: BTreeMap<String, String> },
    RemoveVolume { name: String, force: bool },
    ListNetworks,
    CreateNetwork { name: String, options: NetworkOptions },
    RemoveNetwork { name: String },
    InitSwarm { options: Map<String, Value> },
    JoinSwarm { token: String, manager_addr: String },
    LeaveSwarm { force: bool },
    ListSwarmNodes,
    ListSwarmServices,
}

impl OperationCall {
    /// Run the call.
    pub async fn invoke(&self, client: &EngineClient) -> Result<Value, EngineError> {
        match self {
            OperationCall::ListContainers { all } => client.list_containers(*all).await,
            OperationCall::ListImages => client.list_images().await,
            OperationCall::StartContainer { id } => client.start_container(id).await,
            OperationCall::StopContainer { id, timeout } => client.stop_container(id, *timeout).await,
            OperationCall::RestartContainer { id, timeout } => {
                client.restart_container(id, *timeout).await
            }
            OperationCall::RemoveContainer { id, force, volumes } => {
                client.remove_container(id, *force, *volumes).await
            }
            OperationCall::ContainerLogs { id, options } => client.container_logs(id, *options).await,
            OperationCall::Exec { id, cmd, detach } => client.exec(id, cmd, *detach).await,
            OperationCall::RunContainer {
                image,
                name,
                options,
            } => client.run_container(image, name.as_deref(), options).await,
            OperationCall::PullImage { image } => client.pull_image(image).await,
            OperationCall::RemoveImage { image, force } => client.remove_image(image, *force).await,
            OperationCall::ListVolumes => client.list_volumes().await,
            OperationCall::CreateVolume { name, driver_opts } => {
                client.create_volume(name, driver_opts).await
            }
            OperationCall::RemoveVolume { name, force } => client.remove_volume(name, *force).await,
            OperationCall::ListNetworks => client.list_networks().await,
            OperationCall::CreateNetwork { name, options } => client.create_network(name, options).await,
            OperationCall::RemoveNetwork { name } => client.remove_network(name).await,
            OperationCall::InitSwarm { options } => client.init_swarm(options).await,
            OperationCall::JoinSwarm {
                token,
                manager_addr,
            } => client.join_swarm(token, manager_addr).await,
            OperationCall::LeaveSwarm { force } => client.leave_swarm(*force).await,
            OperationCall::ListSwarmNodes => client.list_swarm_nodes().await,
            OperationCall::ListSwarmServices => client.list_swarm_services().await,
        }
    }
}

use IdentifierKind as Id;
use ParamKind::{Bool, Integer, Object, String as Str, StringList};

const CONTAINER: ParamSpec = required("containerId", Str);

static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "listContainers",
        params: &[optional("all", Bool)],
        binder: |p| Ok(OperationCall::ListContainers { all: p.flag(0, true) }),
    },
    OperationSpec {
        name: "listImages",
        params: &[],
        binder: |_| Ok(OperationCall::ListImages),
    },
    OperationSpec {
        name: "startContainer",
        params: &[CONTAINER],
        binder: |p| {
            Ok(OperationCall::StartContainer {
                id: p.id(0, Id::ContainerId)?,
            })
        },
    },
    OperationSpec {
        name: "stopContainer",
        params: &[CONTAINER, optional("timeout", Integer)],
        binder: |p| {
            Ok(OperationCall::StopContainer {
                id: p.id(0, Id::ContainerId)?,
                timeout: p.number(1, 10),
            })
        },
    },
    OperationSpec {
        name: "restartContainer",
        params: &[CONTAINER, optional("timeout", Integer)],
        binder: |p| {
            Ok(OperationCall::RestartContainer {
                id: p.id(0, Id::ContainerId)?,
                timeout: p.number(1, 10),
            })
        },
    },
    OperationSpec {
        name: "removeContainer",
        params: &[
            CONTAINER,
            optional("force", Bool),
            optional("removeVolumes", Bool),
        ],
        binder: |p| {
            Ok(OperationCall::RemoveContainer {
                id: p.id(0, Id::ContainerId)?,
                force: p.flag(1, false),
                volumes: p.flag(2, false),
            })
        },
    },
    OperationSpec {
        name: "getContainerLogs",
        params: &[
            CONTAINER,
            optional("stdout", Bool),
            optional("stderr", Bool),
            optional("tail", Integer),
        ],
        binder: |p| {
            let defaults = LogsOptions::default();
            Ok(OperationCall::ContainerLogs {
                id: p.id(0, Id::ContainerId)?,
                options: LogsOptions {
                    stdout: p.flag(1, defaults.stdout),
                    stderr: p.flag(2, defaults.stderr),
                    tail: p.number(3, defaults.tail),
                },
            })
        },
    },
    OperationSpec {
        name: "executeCommandInContainer",
        params: &[
            CONTAINER,
            required("command", StringList),
            optional("detach", Bool),
        ],
        binder: |p| {
            Ok(OperationCall::Exec {
                id: p.id(0, Id::ContainerId)?,
                cmd: p.strings(1),
                detach: p.flag(2, false),
            })
        },
    },
    OperationSpec {
        name: "runContainer",
        params: &[
            required("imageName", Str),
            optional("containerName", Str),
            optional("options", Object),
        ],
        binder: |p| {
            let name = match p.string(1) {
                Some(_) => Some(p.id(1, Id::ContainerName)?),
                None => None,
            };
            Ok(OperationCall::RunContainer {
                image: p.id(0, Id::ImageName)?,
                name,
                options: p.decode(2)?,
            })
        },
    },
    OperationSpec {
        name: "pullImage",
        params: &[required("imageName", Str)],
        binder: |p| {
            Ok(OperationCall::PullImage {
                image: p.id(0, Id::ImageName)?,
            })
        },
    },
    OperationSpec {
        name: "removeImage",
        params: &[required("imageId", Str), optional("force", Bool)],
        binder: |p| {
            Ok(OperationCall::RemoveImage {
                image: p.id(0, Id::ImageName)?,
                force: p.flag(1, false),
            })
        },
    },
    OperationSpec {
        name: "listVolumes",
        params: &[],
        binder: |_| Ok(OperationCall::ListVolumes),
    },
    OperationSpec {
        name: "createVolume",
        params: &[required("volumeName", Str), optional("options", Object)],
        binder: |p| {
            Ok(OperationCall::CreateVolume {
                name: p.id(0, Id::VolumeName)?,
                driver_opts: p.decode(1)?,
            })
        },
    },
    OperationSpec {
        name: "removeVolume",
        params: &[required("volumeName", Str), optional("force", Bool)],
        binder: |p| {
            Ok(OperationCall::RemoveVolume {
                name: p.id(0, Id::VolumeName)?,
                force: p.flag(1, false),
            })
        },
    },
    OperationSpec {
        name: "listNetworks",
        params: &[],
        binder: |_| Ok(OperationCall::ListNetworks),
    },
    OperationSpec {
        name: "createNetwork",
        params: &[required("networkName", Str), optional("options", Object)],
        binder: |p| {
            Ok(OperationCall::CreateNetwork {
                name: p.id(0, Id::NetworkName)?,
                options: p.decode(1)?,
            })
        },
    },
    OperationSpec {
        name: "removeNetwork",
        params: &[required("networkName", Str)],
        binder: |p| {
            Ok(OperationCall::RemoveNetwork {
                name: p.id(0, Id::NetworkName)?,
            })
        },
    },
    OperationSpec {
        name: "initSwarm",
        params: &[optional("options", Object)],
        binder: |p| {
            Ok(OperationCall::InitSwarm {
                options: p.object(0),
            })
        },
    },
    OperationSpec {
        name: "joinSwarm",
        params: &[required("joinToken", Str), required("managerAddress", Str)],
        binder: |p| {
            Ok(OperationCall::JoinSwarm {
                token: p.id(0, Id::JoinToken)?,
                manager_addr: p.id(1, Id::ManagerAddress)?,
            })
        },
    },
    OperationSpec {
        name: "leaveSwarm",
        params: &[optional("force", Bool)],
        binder: |p| {
            Ok(OperationCall::LeaveSwarm {
                force: p.flag(0, false),
            })
        },
    },
    OperationSpec {
        name: "listSwarmNodes",
        params: &[],
        binder: |_| Ok(OperationCall::ListSwarmNodes),
    },
    OperationSpec {
        name: "listSwarmServices",
        params: &[],
        binder: |_| Ok(OperationCall::ListSwarmServices),
    },
];

/// Lookup over the operation table.
pub struct OperationRegistry {
    by_name: HashMap<&'static str, &'static OperationSpec>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            by_name: OPERATIONS.iter().map(|spec| (spec.name, spec)).collect(),
        }
    }

    /// Find an operation by its wire name.
    pub fn resolve(&self, name: &str) -> Result<&'static OperationSpec, ExecutorError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ExecutorError::UnsupportedOperation {
                name: name.to_string(),
            })
    }

    /// Resolve and bind in one step.
    pub fn bind(&self, name: &str, params: &[Value]) -> Result<OperationCall, ExecutorError> {
        self.resolve(name)?.bind(params)
    }

    /// Supported operation names in table order.
    pub fn names(&self) -> Vec<&'static str> {
        OPERATIONS.iter().map(|spec| spec.name).collect()
    }

    /// Every operation in table order.
    pub fn specs(&self) -> &'static [OperationSpec] {
        OPERATIONS
    }
}

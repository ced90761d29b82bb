//! Container backend abstraction.
//!
//! The provisioner and orchestrator only talk to a [`ContainerBackend`].
//! [`DockerBackend`](crate::DockerBackend) implements it over the Docker
//! Engine API.

use crate::config::{
    BenchConfig, CONTAINER_CODE_DIR, CPU_PERIOD_US, CPU_QUOTA_US, MEMORY_LIMIT_BYTES,
    NETWORK_MODE, RUNNER_BINARY,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Identifier of a created execution unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to build the environment image from.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Tag to apply.
    pub tag: String,
    /// Build context directory on the host.
    pub context: PathBuf,
    /// Dockerfile path relative to the context.
    pub dockerfile: PathBuf,
    /// Pull a newer base image.
    pub pull: bool,
}

impl ImageSpec {
    /// Image spec from the engine configuration.
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            tag: config.image.clone(),
            context: config.build_context.clone(),
            dockerfile: config.dockerfile.clone(),
            pull: config.pull,
        }
    }
}

/// Resource ceilings applied to an execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Memory ceiling in bytes.
    pub memory_bytes: i64,
    /// CFS period in microseconds.
    pub cpu_period_us: i64,
    /// CFS quota in microseconds.
    pub cpu_quota_us: i64,
    /// Network access disabled.
    pub network_disabled: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: MEMORY_LIMIT_BYTES,
            cpu_period_us: CPU_PERIOD_US,
            cpu_quota_us: CPU_QUOTA_US,
            network_disabled: true,
        }
    }
}

impl ResourceLimits {
    /// Docker network mode for these limits.
    pub fn network_mode(&self) -> &'static str {
        if self.network_disabled {
            NETWORK_MODE
        } else {
            "bridge"
        }
    }
}

/// Everything needed to launch one execution unit.
#[derive(Debug, Clone)]
pub struct UnitSpec {
    /// Unique container name.
    pub name: String,
    /// Image to run.
    pub image: String,
    /// Entry point command.
    pub command: Vec<String>,
    /// Host directory bound read-write into the unit.
    pub workspace: PathBuf,
    /// Mount point of the workspace inside the unit.
    pub mount_point: String,
    /// Resource ceilings.
    pub limits: ResourceLimits,
    /// Container labels.
    pub labels: HashMap<String, String>,
    /// `uid:gid` to run as; the image's default user when unset.
    pub user: Option<String>,
}

impl UnitSpec {
    /// Spec for running the in-sandbox runner against `workspace`.
    pub fn runner(name: impl Into<String>, image: impl Into<String>, workspace: PathBuf) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: vec![
                RUNNER_BINARY.to_string(),
                "--code-dir".to_string(),
                CONTAINER_CODE_DIR.to_string(),
            ],
            workspace,
            mount_point: CONTAINER_CODE_DIR.to_string(),
            limits: ResourceLimits::default(),
            labels: HashMap::new(),
            user: None,
        }
    }

    /// Run as the given `uid:gid`.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// Add a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Bind specification in `host:container:mode` form.
    pub fn bind(&self) -> String {
        format!("{}:{}:rw", self.workspace.display(), self.mount_point)
    }
}

/// Container runtime operations used by the engine.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Check whether an image with this tag exists locally.
    async fn image_exists(&self, tag: &str) -> Result<bool>;

    /// Build an image, streaming build diagnostics to the log.
    async fn build_image(&self, spec: &ImageSpec) -> Result<()>;

    /// Remove an image. Missing images are not an error.
    async fn remove_image(&self, tag: &str) -> Result<()>;

    /// Create and start an execution unit.
    async fn start_unit(&self, spec: &UnitSpec) -> Result<UnitId>;

    /// Wait for the unit to exit and return its exit code.
    async fn wait_unit(&self, id: &UnitId) -> Result<i64>;

    /// Forcibly terminate a running unit.
    async fn kill_unit(&self, id: &UnitId) -> Result<()>;

    /// Full captured output (stdout and stderr, in order).
    async fn unit_logs(&self, id: &UnitId) -> Result<String>;

    /// Remove the unit, killing it if still running.
    async fn remove_unit(&self, id: &UnitId) -> Result<()>;
}

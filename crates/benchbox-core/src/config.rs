//! Benchmark engine configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.
//! Resource ceilings for the execution unit are fixed constants, not settings.

use std::path::PathBuf;
use std::time::Duration;

/// Memory ceiling for the execution unit (1 GiB).
pub const MEMORY_LIMIT_BYTES: i64 = 1024 * 1024 * 1024;

/// CFS scheduler period in microseconds.
pub const CPU_PERIOD_US: i64 = 100_000;

/// CFS quota in microseconds; equal to the period, i.e. one full core.
pub const CPU_QUOTA_US: i64 = 100_000;

/// Docker network mode for the execution unit.
pub const NETWORK_MODE: &str = "none";

/// Mount point of the workspace inside the execution unit.
pub const CONTAINER_CODE_DIR: &str = "/app/code";

/// Runner binary installed in the image.
pub const RUNNER_BINARY: &str = "benchbox-runner";

/// Default overall timeout for one execution unit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Default image tag.
pub const DEFAULT_IMAGE: &str = "code-porter-benchmark:latest";

/// Configuration for the environment provisioner and orchestrator.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Image tag containing all compilers and the runner.
    pub image: String,
    /// Directory sent to the Docker build API.
    pub build_context: PathBuf,
    /// Dockerfile path, relative to the build context.
    pub dockerfile: PathBuf,
    /// Pull a newer base image when building.
    pub pull: bool,
    /// Parent directory for ephemeral workspaces.
    pub workspace_root: PathBuf,
    /// Overall wall-clock limit for one execution unit.
    pub timeout: Duration,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("build context not found: {0}")]
    MissingBuildContext(PathBuf),

    #[error("dockerfile not found: {0}")]
    MissingDockerfile(PathBuf),

    #[error("workspace root not found: {0}")]
    MissingWorkspaceRoot(PathBuf),

    #[error("image name must not be empty")]
    EmptyImage,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            build_context: PathBuf::from("."),
            dockerfile: PathBuf::from("docker/Dockerfile"),
            pull: true,
            workspace_root: std::env::temp_dir(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BenchConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BENCHBOX_IMAGE` | `code-porter-benchmark:latest` |
    /// | `BENCHBOX_BUILD_CONTEXT` | `.` |
    /// | `BENCHBOX_DOCKERFILE` | `docker/Dockerfile` |
    /// | `BENCHBOX_PULL` | `true` |
    /// | `BENCHBOX_WORKSPACE_ROOT` | system temp dir |
    /// | `BENCHBOX_TIMEOUT_SECS` | `180` |
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            image: std::env::var("BENCHBOX_IMAGE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.image),
            build_context: std::env::var("BENCHBOX_BUILD_CONTEXT")
                .map(PathBuf::from)
                .unwrap_or(default.build_context),
            dockerfile: std::env::var("BENCHBOX_DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or(default.dockerfile),
            pull: std::env::var("BENCHBOX_PULL")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(default.pull),
            workspace_root: std::env::var("BENCHBOX_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.workspace_root),
            timeout: std::env::var("BENCHBOX_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.timeout),
        }
    }

    /// Set the image tag.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Set the build context directory.
    pub fn with_build_context(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_context = path.into();
        self
    }

    /// Set the parent directory for workspaces.
    pub fn with_workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace_root = path.into();
        self
    }

    /// Set the overall unit timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full path of the Dockerfile on the host.
    pub fn dockerfile_path(&self) -> PathBuf {
        self.build_context.join(&self.dockerfile)
    }

    /// Validate settings needed to run benchmarks.
    ///
    /// The build context is only needed when the image is missing, so it is
    /// checked by [`validate_build`](Self::validate_build) instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.trim().is_empty() {
            return Err(ConfigError::EmptyImage);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if !self.workspace_root.is_dir() {
            return Err(ConfigError::MissingWorkspaceRoot(self.workspace_root.clone()));
        }
        Ok(())
    }

    /// Validate settings needed to build the image.
    pub fn validate_build(&self) -> Result<(), ConfigError> {
        if !self.build_context.is_dir() {
            return Err(ConfigError::MissingBuildContext(self.build_context.clone()));
        }
        let dockerfile = self.dockerfile_path();
        if !dockerfile.is_file() {
            return Err(ConfigError::MissingDockerfile(dockerfile));
        }
        Ok(())
    }

    /// Validate configuration but only log warnings instead of failing.
    pub fn validate_warn(&self) {
        if let Err(e) = self.validate() {
            tracing::warn!(error = %e, "Invalid configuration");
        }
        if let Err(e) = self.validate_build() {
            tracing::warn!(error = %e, "Image cannot be built from this configuration");
        }
    }
}

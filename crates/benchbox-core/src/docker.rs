//! Docker Engine implementation of [`ContainerBackend`].

use crate::backend::{ContainerBackend, ImageSpec, UnitId, UnitSpec};
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use std::path::{Path, PathBuf};

/// Directories never sent to the Docker daemon as build context.
const CONTEXT_EXCLUDES: &[&str] = &["target", ".git"];

/// Backend talking to a local Docker daemon.
#[derive(Clone)]
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// Check that the daemon is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl ContainerBackend for DockerBackend {
    async fn image_exists(&self, tag: &str) -> Result<bool> {
        match self.docker.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_image(&self, spec: &ImageSpec) -> Result<()> {
        let start = std::time::Instant::now();
        tracing::info!(image = %spec.tag, context = %spec.context.display(), "Building image");
        tracing::info!("This may take 2-5 minutes on first run");

        let context = spec.context.clone();
        let archive = tokio::task::spawn_blocking(move || pack_context(&context))
            .await
            .map_err(|e| CoreError::ImageBuild(format!("context packing task failed: {e}")))??;
        tracing::debug!(bytes = archive.len(), "Build context packed");

        let options = BuildImageOptions {
            dockerfile: spec.dockerfile.to_string_lossy().into_owned(),
            t: spec.tag.clone(),
            rm: true,
            forcerm: true,
            pull: spec.pull,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(bytes::Bytes::from(archive)));

        while let Some(item) = stream.next().await {
            let info = item?;
            if let Some(error) = info.error {
                tracing::error!(image = %spec.tag, error = %error, "Build step failed");
                return Err(CoreError::ImageBuild(error));
            }
            if let Some(line) = info.stream.as_deref().map(str::trim) {
                if line.starts_with("Step") || line.to_lowercase().contains("error") {
                    tracing::info!(image = %spec.tag, "{line}");
                } else if !line.is_empty() {
                    tracing::debug!(image = %spec.tag, "{line}");
                }
            }
        }

        tracing::info!(
            image = %spec.tag,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Image built"
        );
        Ok(())
    }

    async fn remove_image(&self, tag: &str) -> Result<()> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_image(tag, Some(options), None).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                tracing::debug!(image = %tag, "Image not found, nothing to remove");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn start_unit(&self, spec: &UnitSpec) -> Result<UnitId> {
        let host_config = HostConfig {
            binds: Some(vec![spec.bind()]),
            memory: Some(spec.limits.memory_bytes),
            memory_swap: Some(spec.limits.memory_bytes),
            cpu_period: Some(spec.limits.cpu_period_us),
            cpu_quota: Some(spec.limits.cpu_quota_us),
            network_mode: Some(spec.limits.network_mode().to_string()),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.mount_point.clone()),
            user: spec.user.clone(),
            labels: Some(spec.labels.clone()),
            network_disabled: Some(spec.limits.network_disabled),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let created = self.docker.create_container(Some(options), config).await?;
        let id = UnitId(created.id);
        tracing::debug!(container = %spec.name, id = %id, "Container created");

        if let Err(e) = self
            .docker
            .start_container(&id.0, None::<StartContainerOptions<String>>)
            .await
        {
            tracing::error!(container = %spec.name, error = %e, "Container failed to start");
            if let Err(cleanup) = self.remove_unit(&id).await {
                tracing::warn!(container = %spec.name, error = %cleanup, "Failed to remove container");
            }
            return Err(e.into());
        }

        Ok(id)
    }

    async fn wait_unit(&self, id: &UnitId) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(&id.0, Some(options));
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as an error carrying the code
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) if is_not_found(&e) => Err(CoreError::UnitNotFound(id.to_string())),
            Some(Err(e)) => Err(e.into()),
            None => Err(CoreError::UnitNotFound(id.to_string())),
        }
    }

    async fn kill_unit(&self, id: &UnitId) -> Result<()> {
        tracing::warn!(id = %id, "Force killing container");
        self.docker
            .kill_container(&id.0, None::<KillContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn unit_logs(&self, id: &UnitId) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            ..Default::default()
        };
        let mut stream = self.docker.logs(&id.0, Some(options));
        let mut output = Vec::new();
        while let Some(chunk) = stream.next().await {
            output.extend_from_slice(&chunk?.into_bytes());
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn remove_unit(&self, id: &UnitId) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.docker.remove_container(&id.0, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Pack a build context directory into an uncompressed tar archive.
///
/// `target/` and `.git/` are skipped at every level.
pub fn pack_context(context: &Path) -> Result<Vec<u8>> {
    if !context.is_dir() {
        return Err(CoreError::BuildContext {
            path: context.to_path_buf(),
            message: "not a directory".into(),
        });
    }

    let mut builder = tar::Builder::new(Vec::new());
    let mut pending: Vec<PathBuf> = vec![context.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = std::fs::read_dir(&dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name();
            if CONTEXT_EXCLUDES.iter().any(|ex| name == *ex) {
                continue;
            }
            let relative = path.strip_prefix(context).map_err(|e| CoreError::BuildContext {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                builder.append_path_with_name(&path, relative)?;
            }
        }
    }

    Ok(builder.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn archive_names(archive: &[u8]) -> Vec<String> {
        let mut reader = tar::Archive::new(archive);
        let mut names: Vec<String> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_pack_context_skips_build_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docker")).unwrap();
        fs::create_dir_all(dir.path().join("crates/a/src")).unwrap();
        fs::create_dir_all(dir.path().join("target/release")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("docker/Dockerfile"), "FROM ubuntu:22.04\n").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").unwrap();
        fs::write(dir.path().join("crates/a/src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("target/release/big"), "binary").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();

        let archive = pack_context(dir.path()).unwrap();
        assert_eq!(
            archive_names(&archive),
            vec!["Cargo.toml", "crates/a/src/main.rs", "docker/Dockerfile"]
        );
    }

    #[test]
    fn test_pack_context_missing_dir() {
        let result = pack_context(Path::new("/nonexistent/benchbox/context"));
        assert!(matches!(result, Err(CoreError::BuildContext { .. })));
    }
}

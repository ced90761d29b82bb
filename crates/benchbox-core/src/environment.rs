//! Execution environment provisioner.
//!
//! An [`Environment`] owns the image containing every compiler and the
//! runner. It is built at most once: concurrent callers of
//! [`ensure`](Environment::ensure) serialize on a lock around the
//! check-then-build sequence, and once built every later call is a lock-free
//! flag read.

use crate::backend::{ContainerBackend, ImageSpec};
use crate::config::BenchConfig;
use crate::error::Result;
use crate::language::{self, SYSTEM_INFO};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle to the reusable execution image.
pub struct Environment {
    backend: Arc<dyn ContainerBackend>,
    config: BenchConfig,
    built: AtomicBool,
    build_lock: Mutex<()>,
}

impl Environment {
    /// Create a handle; nothing is checked or built until [`ensure`](Self::ensure).
    pub fn new(backend: Arc<dyn ContainerBackend>, config: BenchConfig) -> Self {
        Self {
            backend,
            config,
            built: AtomicBool::new(false),
            build_lock: Mutex::new(()),
        }
    }

    /// Make sure the image exists, building it if necessary.
    ///
    /// Returns `false` when the image is missing and could not be built; the
    /// built flag stays unset so a later call retries.
    pub async fn ensure(&self) -> bool {
        if self.is_built() {
            return true;
        }

        let _guard = self.build_lock.lock().await;
        if self.is_built() {
            return true;
        }

        match self.provision().await {
            Ok(()) => {
                self.built.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                tracing::error!(image = %self.config.image, error = %e, "Environment setup failed");
                false
            }
        }
    }

    async fn provision(&self) -> Result<()> {
        if self.backend.image_exists(&self.config.image).await? {
            tracing::info!(image = %self.config.image, "Image already exists (using cached)");
            return Ok(());
        }

        tracing::info!(image = %self.config.image, "Image not found, building");
        self.config.validate_build()?;
        self.backend
            .build_image(&ImageSpec::from_config(&self.config))
            .await?;
        tracing::info!(image = %self.config.image, "Image built successfully");
        Ok(())
    }

    /// Whether the image is known to exist.
    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    /// Description of the execution environment.
    pub fn system_info(&self) -> &'static str {
        SYSTEM_INFO
    }

    /// Compile command for a language name; empty for interpreted or unknown.
    pub fn compile_command(&self, language: &str) -> &'static str {
        language::compile_command_for(language)
    }

    /// Image tag.
    pub fn image(&self) -> &str {
        &self.config.image
    }

    /// Engine configuration.
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Backend this environment was created with.
    pub fn backend(&self) -> Arc<dyn ContainerBackend> {
        Arc::clone(&self.backend)
    }

    /// Remove the image and reset the built flag.
    pub async fn cleanup(&self) -> Result<()> {
        let _guard = self.build_lock.lock().await;
        tracing::info!(image = %self.config.image, "Removing image");
        self.backend.remove_image(&self.config.image).await?;
        self.built.store(false, Ordering::Release);
        tracing::info!(image = %self.config.image, "Image removed");
        Ok(())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("image", &self.config.image)
            .field("built", &self.is_built())
            .finish()
    }
}

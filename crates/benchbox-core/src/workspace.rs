//! Ephemeral per-run workspace.
//!
//! A workspace is a uniquely named temporary directory holding the source
//! files for one run. It is bound into the execution unit and removed when
//! the [`Workspace`] is closed or dropped, on every exit path.

use crate::error::Result;
use crate::language::Language;
use crate::request::BenchmarkRequest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of workspace directory names.
const WORKSPACE_PREFIX: &str = "benchbox-";

// The runner inside the unit may not share our uid, so the directory and the
// sources it compiles must be world-accessible.
#[cfg(unix)]
fn open_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn open_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// A temporary directory owned by exactly one benchmark run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        open_permissions(dir.path(), 0o777)?;
        tracing::debug!(path = %dir.path().display(), "Workspace created");
        Ok(Self { dir })
    }

    /// Directory path on the host.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `uid:gid` owning the directory.
    ///
    /// The unit runs as this user so everything it creates in the workspace
    /// stays removable by the host.
    #[cfg(unix)]
    pub fn owner(&self) -> Option<String> {
        use std::os::unix::fs::MetadataExt;
        let meta = fs::metadata(self.dir.path()).ok()?;
        Some(format!("{}:{}", meta.uid(), meta.gid()))
    }

    #[cfg(not(unix))]
    pub fn owner(&self) -> Option<String> {
        None
    }

    /// Write one source file under the slot's well-known name.
    pub fn write_source(&self, language: Language, code: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(language.file_name());
        fs::write(&path, code)?;
        open_permissions(&path, 0o666)?;
        tracing::trace!(
            language = %language,
            path = %path.display(),
            bytes = code.len(),
            "Source written"
        );
        Ok(path)
    }

    /// Write every provided source in the request.
    ///
    /// Slots without code get no file; the runner reports them as not found.
    pub fn materialize(&self, request: &BenchmarkRequest) -> Result<Vec<Language>> {
        let mut written = Vec::new();
        for (language, code) in request.present() {
            self.write_source(language, code)?;
            written.push(language);
        }
        Ok(written)
    }

    /// Remove the workspace, logging rather than returning failures.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "Workspace removed"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove workspace")
            }
        }
    }
}

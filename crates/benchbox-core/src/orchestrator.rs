//! Sandbox orchestrator - runs one benchmark request in one execution unit.

use crate::backend::{ContainerBackend, UnitId, UnitSpec};
use crate::environment::Environment;
use crate::error::{CoreError, Result};
use crate::parser;
use crate::request::BenchmarkRequest;
use crate::result::BenchmarkResult;
use crate::workspace::Workspace;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Name of the execution unit for this run.
    pub fn container_name(&self) -> String {
        format!("benchbox-{}", self.0)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What came back from a finished (or abandoned) execution unit.
struct UnitOutcome {
    exit: Result<i64>,
    logs: Result<String>,
}

/// Runs benchmark requests against a provisioned [`Environment`].
///
/// `run` is blocking from the caller's point of view: it returns only after
/// the execution unit finished or was killed at the timeout. Requests are not
/// queued or admitted here; callers that want concurrency run several
/// orchestrators or queue in front of one.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    env: Arc<Environment>,
}

impl Orchestrator {
    /// Create an orchestrator bound to an environment.
    pub fn new(env: Arc<Environment>) -> Self {
        Self { env }
    }

    /// The environment this orchestrator runs in.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Benchmark every provided source.
    ///
    /// Never fails: provisioning, container and parse failures are all
    /// reported through the returned [`BenchmarkResult`].
    pub async fn run(&self, request: &BenchmarkRequest) -> BenchmarkResult {
        if !self.env.ensure().await {
            return BenchmarkResult::setup_failed();
        }

        let run_id = RunId::new();
        let start = std::time::Instant::now();
        tracing::info!(run_id = %run_id, "Starting benchmark run");

        let workspace = match Workspace::create(&self.env.config().workspace_root) {
            Ok(ws) => ws,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Failed to create workspace");
                return BenchmarkResult::failed(e.to_string());
            }
        };

        let result = match self.run_in(run_id, &workspace, request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Benchmark failed");
                BenchmarkResult::failed(e.to_string())
            }
        };
        workspace.close();

        tracing::info!(
            run_id = %run_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            failed = result.is_error(),
            "Benchmark run finished"
        );
        result
    }

    async fn run_in(
        &self,
        run_id: RunId,
        workspace: &Workspace,
        request: &BenchmarkRequest,
    ) -> Result<BenchmarkResult> {
        let written = workspace.materialize(request)?;
        tracing::info!(run_id = %run_id, languages = ?written, "Running benchmark");

        let backend = self.env.backend();
        let spec = UnitSpec::runner(
            run_id.container_name(),
            self.env.image(),
            workspace.path().to_path_buf(),
        )
        .label("benchbox.run_id", run_id.to_string())
        .label("benchbox.started_at", Utc::now().to_rfc3339())
        .with_user(workspace.owner());

        let id = backend.start_unit(&spec).await?;
        tracing::debug!(run_id = %run_id, container = %spec.name, "Container started");
        let unit = UnitGuard::new(Arc::clone(&backend), id);

        let outcome = self.drive(backend.as_ref(), unit.id()).await;
        unit.dispose().await;

        Ok(interpret(outcome))
    }

    /// Wait for the unit under the timeout, then read its logs.
    ///
    /// Logs are always read here, before the caller disposes of the unit.
    async fn drive(&self, backend: &dyn ContainerBackend, id: &UnitId) -> UnitOutcome {
        let timeout = self.env.config().timeout;
        let exit = match tokio::time::timeout(timeout, backend.wait_unit(id)).await {
            Ok(exit) => exit,
            Err(_) => {
                tracing::warn!(container = %id, timeout_secs = timeout.as_secs(), "Container timed out");
                if let Err(e) = backend.kill_unit(id).await {
                    tracing::warn!(container = %id, error = %e, "Failed to kill container");
                }
                Err(CoreError::Timeout(timeout))
            }
        };

        let logs = backend.unit_logs(id).await;
        UnitOutcome { exit, logs }
    }
}

/// Owns a started unit until it is disposed of.
///
/// If the run is abandoned before [`dispose`](Self::dispose) (the `run`
/// future dropped by a caller timeout, `select!` or shutdown), dropping the
/// guard schedules a forced removal on the current runtime.
struct UnitGuard {
    backend: Arc<dyn ContainerBackend>,
    id: UnitId,
    armed: bool,
}

impl UnitGuard {
    fn new(backend: Arc<dyn ContainerBackend>, id: UnitId) -> Self {
        Self {
            backend,
            id,
            armed: true,
        }
    }

    fn id(&self) -> &UnitId {
        &self.id
    }

    async fn dispose(mut self) {
        dispose(self.backend.as_ref(), &self.id).await;
        self.armed = false;
    }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(container = %id, "Run abandoned, removing container");
                handle.spawn(async move { dispose(backend.as_ref(), &id).await });
            }
            Err(_) => {
                tracing::error!(container = %id, "Run abandoned outside a runtime, container leaked")
            }
        }
    }
}

async fn dispose(backend: &dyn ContainerBackend, id: &UnitId) {
    match backend.remove_unit(id).await {
        Ok(()) => tracing::debug!(container = %id, "Container removed"),
        Err(e) => tracing::warn!(container = %id, error = %e, "Failed to remove container"),
    }
}

fn interpret(outcome: UnitOutcome) -> BenchmarkResult {
    match (outcome.exit, outcome.logs) {
        (Ok(code), Ok(output)) => match parser::extract(&output) {
            Some(result) => result,
            None => {
                tracing::warn!(exit_code = code, "Failed to parse benchmark results");
                tracing::debug!(output = %output, "Container output");
                BenchmarkResult::parse_failed(output, Some(code))
            }
        },
        (Ok(code), Err(e)) => BenchmarkResult {
            exit_code: Some(code),
            ..BenchmarkResult::failed(format!("Failed to read container logs: {e}"))
        },
        (Err(e), Ok(output)) => {
            BenchmarkResult::failed(format!("Container execution error: {e}")).with_raw_output(output)
        }
        (Err(e), Err(_)) => BenchmarkResult::failed(format!("Container execution error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;
    use crate::language::Language;
    use crate::result::{LanguageResult, PARSE_FAILED, SETUP_FAILED};
    use crate::testing::{FakeBackend, UnitScript};
    use std::time::Duration;

    struct Harness {
        _root: tempfile::TempDir,
        backend: Arc<FakeBackend>,
        orchestrator: Orchestrator,
    }

    fn harness(backend: FakeBackend, timeout: Duration) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let backend = Arc::new(backend);
        let config = BenchConfig::default()
            .with_workspace_root(root.path())
            .with_timeout(timeout);
        let env = Arc::new(Environment::new(backend.clone(), config));
        Harness {
            _root: root,
            backend,
            orchestrator: Orchestrator::new(env),
        }
    }

    fn assert_cleaned_up(h: &Harness) {
        assert_eq!(h.backend.running(), 0);
        for ws in h.backend.workspaces() {
            assert!(!ws.exists(), "workspace {} left behind", ws.display());
        }
    }

    #[test]
    fn test_run_id_container_name() {
        let id = RunId::new();
        let name = id.container_name();
        assert!(name.starts_with("benchbox-"));
        assert_eq!(name.len(), "benchbox-".len() + 36);
    }

    #[tokio::test]
    async fn test_run_reports_every_slot() {
        let h = harness(FakeBackend::with_image(), Duration::from_secs(5));
        let request = BenchmarkRequest::new().with_payload(Language::Python, "hello");

        let result = h.orchestrator.run(&request).await;

        assert!(result.error.is_none());
        assert_eq!(result.languages.len(), 4);
        let python = result.get(Language::Python).unwrap();
        assert!(python.is_success());
        assert_eq!(python.output(), Some("hello"));
        for lang in [Language::Cpp, Language::Java, Language::Rust] {
            assert_eq!(result.get(lang), Some(&LanguageResult::file_not_found()));
        }
        assert_eq!(h.backend.removed(), 1);
        assert_cleaned_up(&h);
    }

    #[tokio::test]
    async fn test_empty_request_all_not_found() {
        let h = harness(FakeBackend::with_image(), Duration::from_secs(5));
        let result = h
            .orchestrator
            .run(&BenchmarkRequest::from_payloads("", "", "", ""))
            .await;

        assert!(result.error.is_none());
        for lang in Language::ALL {
            assert_eq!(result.get(lang), Some(&LanguageResult::file_not_found()));
        }
        assert_cleaned_up(&h);
    }

    #[tokio::test]
    async fn test_unit_spec_carries_limits() {
        let h = harness(FakeBackend::with_image(), Duration::from_secs(5));
        h.orchestrator.run(&BenchmarkRequest::new()).await;

        let specs = h.backend.specs();
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.image, "code-porter-benchmark:latest");
        assert_eq!(spec.limits.memory_bytes, 1 << 30);
        assert_eq!(spec.limits.network_mode(), "none");
        assert_eq!(spec.mount_point, "/app/code");
        assert!(spec.labels.contains_key("benchbox.run_id"));
        assert!(spec.labels.contains_key("benchbox.started_at"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let root = std::fs::metadata(&h.orchestrator.environment().config().workspace_root)
                .unwrap();
            let user = spec.user.as_deref().unwrap();
            assert!(user.starts_with(&format!("{}:", root.uid())), "{user}");
        }
    }

    #[tokio::test]
    async fn test_setup_failure_is_uniform() {
        let h = harness(FakeBackend::new().failing_build(), Duration::from_secs(5));
        let result = h.orchestrator.run(&BenchmarkRequest::new()).await;

        assert!(result.error.is_some());
        for lang in Language::ALL {
            assert_eq!(result.get(lang).and_then(|r| r.error()), Some(SETUP_FAILED));
        }
        assert!(h.backend.specs().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_output_keeps_raw() {
        let backend = FakeBackend::with_image().with_script(UnitScript::Output {
            exit_code: 137,
            output: "Killed\n".into(),
        });
        let h = harness(backend, Duration::from_secs(5));
        let result = h.orchestrator.run(&BenchmarkRequest::new()).await;

        assert_eq!(result.error.as_deref(), Some(PARSE_FAILED));
        assert_eq!(result.raw_output.as_deref(), Some("Killed\n"));
        assert_eq!(result.exit_code, Some(137));
        assert!(result.languages.is_empty());
        assert_cleaned_up(&h);
    }

    #[tokio::test]
    async fn test_timeout_kills_and_removes_unit() {
        let backend = FakeBackend::with_image().with_script(UnitScript::Hang);
        let h = harness(backend, Duration::from_millis(50));
        let result = h
            .orchestrator
            .run(&BenchmarkRequest::new().with_payload(Language::Python, "while True: pass"))
            .await;

        let error = result.error.as_deref().unwrap();
        assert!(error.starts_with("Container execution error"), "{error}");
        assert!(error.contains("timed out"));
        assert_eq!(result.raw_output.as_deref(), Some("Running python code...\n"));
        assert_eq!(h.backend.killed(), 1);
        assert_eq!(h.backend.removed(), 1);
        assert_cleaned_up(&h);
    }

    #[tokio::test]
    async fn test_abandoned_run_removes_unit() {
        let backend = FakeBackend::with_image().with_script(UnitScript::Hang);
        let h = harness(backend, Duration::from_secs(60));
        let request = BenchmarkRequest::new().with_payload(Language::Python, "while True: pass");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), h.orchestrator.run(&request)).await;
        assert!(abandoned.is_err());

        for _ in 0..100 {
            if h.backend.removed() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(h.backend.removed(), 1);
        assert_cleaned_up(&h);
    }

    #[tokio::test]
    async fn test_start_failure_still_removes_workspace() {
        let backend = FakeBackend::with_image().with_script(UnitScript::FailStart);
        let h = harness(backend, Duration::from_secs(5));
        let root = h.orchestrator.environment().config().workspace_root.clone();

        let result = h
            .orchestrator
            .run(&BenchmarkRequest::new().with_payload(Language::Rust, "fn main() {}"))
            .await;

        assert!(result.error.is_some());
        assert!(result.languages.is_empty());
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_log_failure_reports_error() {
        let backend = FakeBackend::with_image().with_script(UnitScript::LogsFail);
        let h = harness(backend, Duration::from_secs(5));
        let result = h.orchestrator.run(&BenchmarkRequest::new()).await;

        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to read container logs"));
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(h.backend.removed(), 1);
        assert_cleaned_up(&h);
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_distinct_workspaces() {
        let h = harness(FakeBackend::with_image(), Duration::from_secs(5));
        let request = BenchmarkRequest::new().with_payload(Language::Python, "x");

        let (a, b) = tokio::join!(h.orchestrator.run(&request), h.orchestrator.run(&request));
        assert!(a.error.is_none() && b.error.is_none());

        let workspaces = h.backend.workspaces();
        assert_eq!(workspaces.len(), 2);
        assert_ne!(workspaces[0], workspaces[1]);
        assert_cleaned_up(&h);
    }
}

//! In-memory container backend for tests.

use crate::backend::{ContainerBackend, ImageSpec, UnitId, UnitSpec};
use crate::error::{CoreError, Result};
use crate::language::Language;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What a started unit does.
#[derive(Debug, Clone)]
pub enum UnitScript {
    /// Behave like the runner: report every slot based on which files exist.
    Runner,
    /// Exit with the given code after printing the given output.
    Output { exit_code: i64, output: String },
    /// Never exit on its own.
    Hang,
    /// Fail to start.
    FailStart,
    /// Exit normally but fail when logs are requested.
    LogsFail,
}

#[derive(Debug, Default)]
struct State {
    running: HashSet<String>,
    killed: Vec<String>,
    removed: Vec<String>,
    workspaces: Vec<PathBuf>,
    specs: Vec<UnitSpec>,
    logs: std::collections::HashMap<String, String>,
}

/// Scriptable [`ContainerBackend`].
pub struct FakeBackend {
    has_image: AtomicBool,
    build_fails: AtomicBool,
    build_delay: Duration,
    builds: AtomicU32,
    image_checks: AtomicU32,
    next_id: AtomicU32,
    script: UnitScript,
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            has_image: AtomicBool::new(false),
            build_fails: AtomicBool::new(false),
            build_delay: Duration::ZERO,
            builds: AtomicU32::new(0),
            image_checks: AtomicU32::new(0),
            next_id: AtomicU32::new(1),
            script: UnitScript::Runner,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_image() -> Self {
        let backend = Self::new();
        backend.has_image.store(true, Ordering::SeqCst);
        backend
    }

    pub fn with_script(mut self, script: UnitScript) -> Self {
        self.script = script;
        self
    }

    pub fn with_build_delay_ms(mut self, ms: u64) -> Self {
        self.build_delay = Duration::from_millis(ms);
        self
    }

    pub fn failing_build(self) -> Self {
        self.build_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_build_fails(&self, fails: bool) {
        self.build_fails.store(fails, Ordering::SeqCst);
    }

    pub fn builds(&self) -> u32 {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn image_checks(&self) -> u32 {
        self.image_checks.load(Ordering::SeqCst)
    }

    pub fn has_image(&self) -> bool {
        self.has_image.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.state.lock().unwrap().running.len()
    }

    pub fn killed(&self) -> usize {
        self.state.lock().unwrap().killed.len()
    }

    pub fn removed(&self) -> usize {
        self.state.lock().unwrap().removed.len()
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().workspaces.clone()
    }

    pub fn specs(&self) -> Vec<UnitSpec> {
        self.state.lock().unwrap().specs.clone()
    }

    fn simulate_runner(spec: &UnitSpec) -> String {
        let mut lines = Vec::new();
        let mut results = serde_json::Map::new();
        for language in Language::ALL {
            let path = spec.workspace.join(language.file_name());
            let result = match std::fs::read_to_string(&path) {
                Ok(code) => {
                    lines.push(format!("Running {language} code..."));
                    serde_json::json!({
                        "success": true,
                        "execution_time": 0.0125,
                        "output": code.trim(),
                    })
                }
                Err(_) => serde_json::json!({
                    "success": false,
                    "error": "File not found",
                    "execution_time": null,
                }),
            };
            results.insert(language.key().to_string(), result);
        }
        lines.push(serde_json::Value::Object(results).to_string());
        lines.join("\n") + "\n"
    }
}

#[async_trait]
impl ContainerBackend for FakeBackend {
    async fn image_exists(&self, _tag: &str) -> Result<bool> {
        self.image_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.has_image())
    }

    async fn build_image(&self, _spec: &ImageSpec) -> Result<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }
        if self.build_fails.load(Ordering::SeqCst) {
            return Err(CoreError::ImageBuild("apt-get failed".into()));
        }
        self.has_image.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_image(&self, _tag: &str) -> Result<()> {
        self.has_image.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn start_unit(&self, spec: &UnitSpec) -> Result<UnitId> {
        if matches!(self.script, UnitScript::FailStart) {
            return Err(CoreError::UnitNotFound("image missing".into()));
        }
        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let logs = match &self.script {
            UnitScript::Runner => Self::simulate_runner(spec),
            UnitScript::Output { output, .. } => output.clone(),
            _ => "Running python code...\n".to_string(),
        };

        let mut state = self.state.lock().unwrap();
        state.running.insert(id.clone());
        state.workspaces.push(spec.workspace.clone());
        state.specs.push(spec.clone());
        state.logs.insert(id.clone(), logs);
        Ok(UnitId(id))
    }

    async fn wait_unit(&self, id: &UnitId) -> Result<i64> {
        match &self.script {
            UnitScript::Hang => std::future::pending().await,
            UnitScript::Output { exit_code, .. } => {
                self.state.lock().unwrap().running.remove(&id.0);
                Ok(*exit_code)
            }
            _ => {
                self.state.lock().unwrap().running.remove(&id.0);
                Ok(0)
            }
        }
    }

    async fn kill_unit(&self, id: &UnitId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.running.remove(&id.0);
        state.killed.push(id.0.clone());
        Ok(())
    }

    async fn unit_logs(&self, id: &UnitId) -> Result<String> {
        if matches!(self.script, UnitScript::LogsFail) {
            return Err(CoreError::UnitNotFound(id.to_string()));
        }
        let state = self.state.lock().unwrap();
        Ok(state.logs.get(&id.0).cloned().unwrap_or_default())
    }

    async fn remove_unit(&self, id: &UnitId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.running.remove(&id.0);
        state.removed.push(id.0.clone());
        Ok(())
    }
}

//! Result channel wire types for benchbox-runner.
//!
//! The runner prints one JSON object, keyed by language, as the final line
//! of its standard output.

use serde::Serialize;
use std::collections::BTreeMap;

/// Per-language result record.
///
/// Constructors keep `execution_time` and `output` present only on success
/// and `error` present only on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl LanguageResult {
    /// Run stage exited with code zero.
    pub fn success(execution_time: f64, output: impl Into<String>) -> Self {
        Self {
            success: true,
            execution_time: Some(execution_time.max(0.0)),
            output: Some(output.into()),
            error: None,
        }
    }

    /// Generic failure. An empty message is replaced so `error` is never blank.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            execution_time: None,
            output: None,
            error: Some(if error.is_empty() {
                "unknown error".to_string()
            } else {
                error
            }),
        }
    }

    /// Source file absent; nothing was attempted.
    pub fn file_not_found() -> Self {
        Self::failure("File not found")
    }

    /// Compiler exited non-zero.
    pub fn compilation_error(stderr: &str) -> Self {
        Self::failure(format!("Compilation error: {stderr}"))
    }

    /// Program exited non-zero.
    pub fn runtime_error(stderr: &str) -> Self {
        Self::failure(format!("Runtime error: {stderr}"))
    }

    /// A stage exceeded its time limit and was killed.
    pub fn timeout() -> Self {
        Self::failure("Execution timeout")
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn execution_time(&self) -> Option<f64> {
        self.execution_time
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// All results of one invocation, keyed by language.
pub type Report = BTreeMap<&'static str, LanguageResult>;

/// Serialize a report as a single line.
pub fn render(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string(report)
}

//! Benchmark result model.
//!
//! A [`LanguageResult`] is either a timed success or a failure with a
//! message. On the wire it is a flat record:
//!
//! ```text
//! {"success":true,"execution_time":0.423,"output":"..."}
//! {"success":false,"error":"Compilation error: ..."}
//! ```

use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error message used when a slot's source file was absent.
pub const FILE_NOT_FOUND: &str = "File not found";

/// Per-slot error when the environment could not be provisioned.
pub const SETUP_FAILED: &str = "Docker setup failed";

/// Top-level error when the environment could not be provisioned.
pub const IMAGE_BUILD_FAILED: &str = "Failed to build Docker image";

/// Top-level error when the result channel could not be parsed.
pub const PARSE_FAILED: &str = "Failed to parse benchmark results";

/// Outcome of one language slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireLanguageResult", into = "WireLanguageResult")]
pub enum LanguageResult {
    /// The program ran to completion with exit code zero.
    Success {
        /// Wall-clock seconds of the run stage only.
        execution_time: f64,
        /// Trimmed standard output.
        output: String,
    },
    /// The slot was absent, failed to compile, failed at runtime or timed out.
    Failure {
        /// Non-empty description.
        error: String,
    },
}

impl LanguageResult {
    /// Create a failure result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// The canonical "not attempted" result.
    pub fn file_not_found() -> Self {
        Self::failure(FILE_NOT_FOUND)
    }

    /// Whether the slot succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Run-stage time in seconds, present only on success.
    pub fn execution_time(&self) -> Option<f64> {
        match self {
            Self::Success { execution_time, .. } => Some(*execution_time),
            Self::Failure { .. } => None,
        }
    }

    /// Program output, present only on success.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success { output, .. } => Some(output),
            Self::Failure { .. } => None,
        }
    }

    /// Error message, present only on failure.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireLanguageResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<WireLanguageResult> for LanguageResult {
    type Error = String;

    fn try_from(wire: WireLanguageResult) -> Result<Self, Self::Error> {
        if wire.success {
            let execution_time = wire
                .execution_time
                .ok_or("successful result is missing execution_time")?;
            if !execution_time.is_finite() || execution_time < 0.0 {
                return Err(format!("invalid execution_time: {execution_time}"));
            }
            Ok(Self::Success {
                execution_time,
                output: wire.output.unwrap_or_default(),
            })
        } else {
            let error = wire
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            Ok(Self::Failure { error })
        }
    }
}

impl From<LanguageResult> for WireLanguageResult {
    fn from(result: LanguageResult) -> Self {
        match result {
            LanguageResult::Success {
                execution_time,
                output,
            } => Self {
                success: true,
                execution_time: Some(execution_time),
                output: Some(output),
                error: None,
            },
            LanguageResult::Failure { error } => Self {
                success: false,
                execution_time: None,
                output: None,
                error: Some(error),
            },
        }
    }
}

/// Result of one benchmark request.
///
/// Serializes as a flat object: one key per language slot, plus `error`,
/// `raw_output` and `exit_code` when the pipeline itself failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkResult {
    /// Per-slot results.
    #[serde(flatten)]
    pub languages: BTreeMap<Language, LanguageResult>,
    /// Pipeline-level failure, set only when per-language results are missing
    /// or uniformly failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured container output, kept for diagnosis on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// Container exit code, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}

impl BenchmarkResult {
    /// Build a result from per-slot results.
    pub fn from_languages(languages: BTreeMap<Language, LanguageResult>) -> Self {
        Self {
            languages,
            ..Default::default()
        }
    }

    /// The environment could not be provisioned: every slot fails uniformly.
    pub fn setup_failed() -> Self {
        Self {
            languages: Language::ALL
                .iter()
                .map(|lang| (*lang, LanguageResult::failure(SETUP_FAILED)))
                .collect(),
            error: Some(IMAGE_BUILD_FAILED.to_string()),
            ..Default::default()
        }
    }

    /// The result channel could not be parsed.
    pub fn parse_failed(raw_output: impl Into<String>, exit_code: Option<i64>) -> Self {
        Self {
            error: Some(PARSE_FAILED.to_string()),
            raw_output: Some(raw_output.into()),
            exit_code,
            ..Default::default()
        }
    }

    /// A pipeline-level failure without per-language results.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Attach captured output to a failed result.
    pub fn with_raw_output(mut self, raw_output: impl Into<String>) -> Self {
        self.raw_output = Some(raw_output.into());
        self
    }

    /// Result for one slot, if present.
    pub fn get(&self, language: Language) -> Option<&LanguageResult> {
        self.languages.get(&language)
    }

    /// Whether the pipeline reported a top-level error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

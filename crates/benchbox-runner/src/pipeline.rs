//! Per-language compile and run pipeline.
//!
//! `NOT_PRESENT | COMPILING -> (COMPILE_FAILED | RUNNING) -> (TIMED_OUT | RUN_FAILED | SUCCEEDED)`

use crate::exec::{run_stage, StageOutcome};
use crate::protocol::{LanguageResult, Report};
use crate::toolchain::Toolchain;
use std::path::Path;
use tracing::{info, info_span, Instrument};

/// Process one language slot.
pub async fn run_language(toolchain: &Toolchain, code_dir: &Path) -> LanguageResult {
    if !code_dir.join(toolchain.file).is_file() {
        info!(language = toolchain.key, "no source file, skipping");
        return LanguageResult::file_not_found();
    }

    if let Some(compile) = &toolchain.compile {
        info!("Compiling and running {} code...", toolchain.label);
        match run_stage(compile, code_dir).await {
            StageOutcome::Exited { exit_code: 0, .. } => {}
            StageOutcome::Exited { stderr, .. } => {
                return LanguageResult::compilation_error(&stderr);
            }
            StageOutcome::TimedOut => return LanguageResult::timeout(),
            StageOutcome::Failed(e) => return LanguageResult::failure(e),
        }
    } else {
        info!("Running {} code...", toolchain.label);
    }

    match run_stage(&toolchain.run, code_dir).await {
        StageOutcome::Exited {
            exit_code: 0,
            stdout,
            elapsed,
            ..
        } => {
            info!(
                language = toolchain.key,
                elapsed_ms = elapsed.as_millis() as u64,
                "run succeeded"
            );
            LanguageResult::success(elapsed.as_secs_f64(), stdout.trim())
        }
        StageOutcome::Exited {
            exit_code, stderr, ..
        } => {
            info!(language = toolchain.key, exit_code, "run failed");
            LanguageResult::runtime_error(&stderr)
        }
        StageOutcome::TimedOut => LanguageResult::timeout(),
        StageOutcome::Failed(e) => LanguageResult::failure(e),
    }
}

/// Process every slot strictly in order, one at a time.
pub async fn run_all(toolchains: &[Toolchain], code_dir: &Path) -> Report {
    let mut report = Report::new();
    for toolchain in toolchains {
        let result = run_language(toolchain, code_dir)
            .instrument(info_span!("language", key = toolchain.key))
            .await;
        report.insert(toolchain.key, result);
    }
    report
}

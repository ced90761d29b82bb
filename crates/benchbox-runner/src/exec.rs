//! Stage execution with time limits.

use crate::toolchain::Stage;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Maximum size of captured stdout or stderr (1MB).
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How a stage ended.
#[derive(Debug)]
pub enum StageOutcome {
    /// Process exited. `elapsed` spans launch to exit.
    Exited {
        exit_code: i32,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },
    /// Time limit hit; the process was killed.
    TimedOut,
    /// Process could not be launched or awaited.
    Failed(String),
}

/// Truncate output to max_bytes on a UTF-8 boundary.
fn truncate_output(s: String, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_string();
    truncated.push_str("\n... [output truncated]");
    truncated
}

/// Run one stage in `cwd`, killing it if it exceeds its limit.
pub async fn run_stage(stage: &Stage, cwd: &Path) -> StageOutcome {
    debug!(cmd = %stage.display(), timeout_secs = stage.timeout.as_secs(), "starting stage");

    let mut cmd = Command::new(&stage.program);
    cmd.args(&stage.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(error = %e, cmd = %stage.display(), "failed to launch");
            return StageOutcome::Failed(format!("Failed to launch {}: {e}", stage.display()));
        }
    };

    // Dropping the wait future on timeout drops the child, which kills it.
    match tokio::time::timeout(stage.timeout, child.wait_with_output()).await {
        Ok(Ok(out)) => {
            let elapsed = started.elapsed();
            let exit_code = out.status.code().unwrap_or(-1);
            let stdout =
                truncate_output(String::from_utf8_lossy(&out.stdout).into_owned(), MAX_OUTPUT_SIZE);
            let stderr =
                truncate_output(String::from_utf8_lossy(&out.stderr).into_owned(), MAX_OUTPUT_SIZE);
            debug!(
                exit_code,
                elapsed_ms = elapsed.as_millis() as u64,
                stdout_len = stdout.len(),
                stderr_len = stderr.len(),
                "stage completed"
            );
            trace!(stdout = %stdout, stderr = %stderr, "stage output");
            StageOutcome::Exited {
                exit_code,
                stdout,
                stderr,
                elapsed,
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, cmd = %stage.display(), "failed to wait for process");
            StageOutcome::Failed(format!("Failed to run {}: {e}", stage.display()))
        }
        Err(_) => {
            warn!(cmd = %stage.display(), timeout_secs = stage.timeout.as_secs(), "stage timed out");
            StageOutcome::TimedOut
        }
    }
}

//! benchbox-runner: in-container multi-language runner.
//!
//! Looks for `code.py`, `code.cpp`, `code.rs` and `Main.java` in the code
//! directory, compiles and runs each one present, and prints one JSON object
//! keyed by language as the last line of stdout. Diagnostics go to stderr.

mod exec;
mod pipeline;
mod protocol;
mod toolchain;

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use toolchain::Toolchain;
use tracing::info;

/// Default code directory inside the container.
const CODE_DIR: &str = "/app/code";

#[derive(Parser, Debug)]
#[command(name = "benchbox-runner", version, about = "Compile, run and time benchmark sources")]
struct Args {
    /// Directory holding the source files
    #[arg(long, env = "BENCHBOX_CODE_DIR", default_value = CODE_DIR)]
    code_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("benchbox_runner=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let code_dir = toolchain::resolve_code_dir(&args.code_dir)?;
    info!(code_dir = %code_dir.display(), "benchbox-runner starting");

    let toolchains = Toolchain::defaults(&code_dir);
    let report = pipeline::run_all(&toolchains, &code_dir).await;

    let line = protocol::render(&report)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

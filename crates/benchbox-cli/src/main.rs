//! benchbox command-line entry point.
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::Context;
use benchbox_core::{
    BenchConfig, BenchmarkRequest, DockerBackend, Environment, Language, Orchestrator, Source,
    SYSTEM_INFO,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "benchbox", version, about = "Benchmark programs in a sandboxed container")]
struct Cli {
    /// Execution image tag (overrides BENCHBOX_IMAGE)
    #[arg(long, global = true)]
    image: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> BenchConfig {
        let config = BenchConfig::from_env();
        match &self.image {
            Some(image) => config.with_image(image.as_str()),
            None => config,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile, run and time the given sources
    Run(RunArgs),
    /// Show the execution environment and compile commands
    Info {
        /// Only show the compile command for this language
        language: Option<String>,
    },
    /// Build the execution image if it is missing
    Build,
    /// Remove the execution image
    Cleanup,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Python source file
    #[arg(long)]
    python: Option<PathBuf>,
    /// C++ source file
    #[arg(long)]
    cpp: Option<PathBuf>,
    /// Java source file (class Main)
    #[arg(long)]
    java: Option<PathBuf>,
    /// Rust source file
    #[arg(long)]
    rust: Option<PathBuf>,
    /// Overall container timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,
}

impl RunArgs {
    fn sources(&self) -> [(Language, Option<&Path>); 4] {
        [
            (Language::Python, self.python.as_deref()),
            (Language::Cpp, self.cpp.as_deref()),
            (Language::Java, self.java.as_deref()),
            (Language::Rust, self.rust.as_deref()),
        ]
    }

    /// Read every given file into a request.
    fn load_request(&self) -> anyhow::Result<BenchmarkRequest> {
        let mut request = BenchmarkRequest::new();
        for (language, path) in self.sources() {
            let Some(path) = path else { continue };
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {language} source {}", path.display()))?;
            if matches!(Source::from_payload(text.as_str()), Source::NotProvided) {
                tracing::warn!(%language, path = %path.display(), "source is empty or a placeholder, skipping");
            }
            request = request.with_payload(language, text);
        }
        Ok(request)
    }
}

#[derive(Serialize, Debug)]
struct InfoReport {
    system_info: &'static str,
    compile_commands: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize, Debug)]
struct CompileCommandReport<'a> {
    language: &'a str,
    compile_command: &'static str,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("benchbox_core=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    match cli.command {
        Command::Info { language } => info(language.as_deref()),
        Command::Run(args) => run(args, config).await,
        Command::Build => build(config).await,
        Command::Cleanup => cleanup(config).await,
    }
}

async fn environment(config: BenchConfig) -> anyhow::Result<Arc<Environment>> {
    config.validate_warn();
    let backend = DockerBackend::connect().context("failed to connect to Docker")?;
    backend
        .ping()
        .await
        .context("Docker daemon is not reachable")?;
    Ok(Arc::new(Environment::new(Arc::new(backend), config)))
}

fn info(language: Option<&str>) -> anyhow::Result<ExitCode> {
    let json = match language {
        Some(language) => serde_json::to_string_pretty(&CompileCommandReport {
            language,
            compile_command: benchbox_core::compile_command_for(language),
        })?,
        None => serde_json::to_string_pretty(&InfoReport {
            system_info: SYSTEM_INFO,
            compile_commands: Language::ALL
                .into_iter()
                .map(|l| (l.key(), l.compile_command().unwrap_or("")))
                .collect(),
        })?,
    };
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

async fn run(args: RunArgs, mut config: BenchConfig) -> anyhow::Result<ExitCode> {
    let request = args.load_request()?;

    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let orchestrator = Orchestrator::new(environment(config).await?);

    let result = orchestrator.run(&request).await;
    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");

    Ok(if result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn build(config: BenchConfig) -> anyhow::Result<ExitCode> {
    let env = environment(config).await?;
    if env.ensure().await {
        tracing::info!(image = %env.image(), "Environment ready");
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(image = %env.image(), "Environment setup failed");
        Ok(ExitCode::FAILURE)
    }
}

async fn cleanup(config: BenchConfig) -> anyhow::Result<ExitCode> {
    let env = environment(config).await?;
    env.cleanup().await.context("failed to remove image")?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("benchbox").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_run() {
        let cli = parse(&["run", "--python", "a.py", "--rust", "b.rs", "--pretty"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.python, Some(PathBuf::from("a.py")));
        assert_eq!(args.rust, Some(PathBuf::from("b.rs")));
        assert!(args.cpp.is_none());
        assert!(args.pretty);
    }

    #[test]
    fn test_parse_info_language() {
        let cli = parse(&["info", "cpp"]);
        assert!(matches!(cli.command, Command::Info { language: Some(ref l) } if l == "cpp"));
    }

    #[test]
    fn test_image_flag_overrides_config() {
        let cli = parse(&["build", "--image", "bench:test"]);
        assert_eq!(cli.config().image, "bench:test");

        let cli = parse(&["--image", "bench:other", "info"]);
        assert_eq!(cli.config().image, "bench:other");
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["benchbox", "serve"]).is_err());
    }

    #[test]
    fn test_load_request_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let py = dir.path().join("a.py");
        let java = dir.path().join("Main.java");
        std::fs::write(&py, "print(1)\n").unwrap();
        std::fs::write(&java, "// No Java code provided\n").unwrap();

        let cli = parse(&[
            "run",
            "--python",
            py.to_str().unwrap(),
            "--java",
            java.to_str().unwrap(),
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let request = args.load_request().unwrap();

        assert_eq!(request.source(Language::Python).code(), Some("print(1)\n"));
        assert_eq!(request.source(Language::Java), &Source::NotProvided);
        assert_eq!(request.source(Language::Cpp), &Source::NotProvided);
    }

    #[test]
    fn test_load_request_missing_file() {
        let cli = parse(&["run", "--cpp", "/nonexistent/code.cpp"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let err = args.load_request().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/code.cpp"));
    }
}

//! # benchbox-core
//!
//! Sandboxed multi-language benchmark engine.
//!
//! Given up to four sources (Python, C++, Java, Rust), this crate compiles
//! and runs each inside a resource-bounded, network-less Docker container and
//! returns one uniform result per language.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  benchbox-core (host)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │  Orchestrator   │────▶│  Environment             │   │
//! │  │   - run()       │     │   - ensure()  (once)     │   │
//! │  └─────────────────┘     │   - compile_command()    │   │
//! │       │        │         └──────────────────────────┘   │
//! │       │        ▼                      │                  │
//! │       │  ┌───────────┐   ┌──────────────────────────┐   │
//! │       │  │ Workspace │   │  ContainerBackend        │   │
//! │       │  │ (tempdir) │   │  (DockerBackend/bollard) │   │
//! │       │  └───────────┘   └──────────────────────────┘   │
//! │       ▼                               │ bind /app/code  │
//! │  ┌─────────────────┐                  │                  │
//! │  │ parser::extract │◀── container logs┘                  │
//! │  └─────────────────┘                                     │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │              benchbox-runner (in container)              │
//! │   python → cpp → rust → java, one JSON line on stdout    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use benchbox_core::{BenchConfig, BenchmarkRequest, DockerBackend, Environment, Language, Orchestrator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(DockerBackend::connect()?);
//! let env = Arc::new(Environment::new(backend, BenchConfig::from_env()));
//! let orchestrator = Orchestrator::new(env);
//!
//! let request = BenchmarkRequest::new()
//!     .with_payload(Language::Python, "print('hello')")
//!     .with_payload(Language::Rust, "fn main() { println!(\"hello\"); }");
//!
//! let result = orchestrator.run(&request).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod docker;
mod environment;
mod error;
mod language;
pub mod parser;
mod orchestrator;
mod request;
mod result;
mod workspace;

#[cfg(test)]
mod testing;

pub use backend::{ContainerBackend, ImageSpec, ResourceLimits, UnitId, UnitSpec};
pub use config::{
    BenchConfig, ConfigError, CONTAINER_CODE_DIR, CPU_PERIOD_US, CPU_QUOTA_US, DEFAULT_IMAGE,
    DEFAULT_TIMEOUT, MEMORY_LIMIT_BYTES, NETWORK_MODE,
};
pub use docker::{pack_context, DockerBackend};
pub use environment::Environment;
pub use error::{CoreError, Result};
pub use language::{compile_command_for, Language, UnknownLanguage, SYSTEM_INFO};
pub use orchestrator::{Orchestrator, RunId};
pub use request::{BenchmarkRequest, Source};
pub use result::{
    BenchmarkResult, LanguageResult, FILE_NOT_FOUND, IMAGE_BUILD_FAILED, PARSE_FAILED,
    SETUP_FAILED,
};
pub use workspace::Workspace;

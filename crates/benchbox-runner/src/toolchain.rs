//! Per-language toolchain table.
//!
//! Commands are fixed and must match what the host advertises as each
//! language's compile command.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compile stage limit for C++ and Java.
const COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Compile stage limit for Rust.
const RUST_COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Run stage limit for every language.
const RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Absolute form of the code directory.
///
/// Stages run with the code directory as working directory while compiled
/// artifacts are launched by path inside it, so the path must not be relative.
pub fn resolve_code_dir(dir: &Path) -> std::io::Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

/// One external process invocation with its time limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Stage {
    pub fn new(program: impl Into<PathBuf>, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }

    /// Command line as shown in logs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// How to build and run one language's source file.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Key in the result object.
    pub key: &'static str,
    /// Human-readable name used in progress lines.
    pub label: &'static str,
    /// Source file name inside the code directory.
    pub file: &'static str,
    pub compile: Option<Stage>,
    pub run: Stage,
}

impl Toolchain {
    /// The four supported languages in processing order: python, cpp, rust, java.
    ///
    /// Produced artifacts are run by absolute path inside `code_dir`.
    pub fn defaults(code_dir: &Path) -> Vec<Toolchain> {
        vec![
            Toolchain {
                key: "python",
                label: "Python",
                file: "code.py",
                compile: None,
                run: Stage::new("python3", &["code.py"], RUN_TIMEOUT),
            },
            Toolchain {
                key: "cpp",
                label: "C++",
                file: "code.cpp",
                compile: Some(Stage::new(
                    "g++",
                    &["-O3", "-std=c++17", "-march=native", "code.cpp", "-o", "cpp_program"],
                    COMPILE_TIMEOUT,
                )),
                run: Stage::new(code_dir.join("cpp_program"), &[], RUN_TIMEOUT),
            },
            Toolchain {
                key: "rust",
                label: "Rust",
                file: "code.rs",
                compile: Some(Stage::new(
                    "rustc",
                    &[
                        "-C",
                        "opt-level=3",
                        "-C",
                        "target-cpu=native",
                        "code.rs",
                        "-o",
                        "rust_program",
                    ],
                    RUST_COMPILE_TIMEOUT,
                )),
                run: Stage::new(code_dir.join("rust_program"), &[], RUN_TIMEOUT),
            },
            Toolchain {
                key: "java",
                label: "Java",
                file: "Main.java",
                compile: Some(Stage::new("javac", &["Main.java"], COMPILE_TIMEOUT)),
                run: Stage::new("java", &["Main"], RUN_TIMEOUT),
            },
        ]
    }
}

//! The four fixed language slots and their toolchain table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Description of the execution environment, shown to code generators.
pub const SYSTEM_INFO: &str = "Ubuntu 22.04 x86_64 (Docker)";

/// A benchmark language slot.
///
/// The serialized form is the wire key used in the result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Interpreted baseline.
    Python,
    /// C++ (g++).
    Cpp,
    /// Java (javac + JVM).
    Java,
    /// Rust (rustc).
    Rust,
}

impl Language {
    /// All slots, in the order the runner processes them.
    pub const ALL: [Language; 4] = [Self::Python, Self::Cpp, Self::Rust, Self::Java];

    /// Wire key for this slot.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Rust => "rust",
        }
    }

    /// Well-known file name the runner looks for in the workspace.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Python => "code.py",
            Self::Cpp => "code.cpp",
            Self::Java => "Main.java",
            Self::Rust => "code.rs",
        }
    }

    /// Whether this slot has a compile stage.
    pub fn is_compiled(&self) -> bool {
        !matches!(self, Self::Python)
    }

    /// Compile invocation for this slot, or `None` for the interpreter.
    pub fn compile_command(&self) -> Option<&'static str> {
        match self {
            Self::Python => None,
            Self::Cpp => Some("g++ -O3 -std=c++17 -march=native code.cpp -o cpp_program"),
            Self::Java => Some("javac Main.java"),
            Self::Rust => Some("rustc -C opt-level=3 -C target-cpu=native code.rs -o rust_program"),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when parsing an unknown language name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Self::Python),
            "cpp" | "c++" => Ok(Self::Cpp),
            "java" => Ok(Self::Java),
            "rust" | "rs" => Ok(Self::Rust),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

/// Look up the compile command for a language name.
///
/// Unknown names and the interpreted slot yield an empty string.
pub fn compile_command_for(name: &str) -> &'static str {
    name.parse::<Language>()
        .ok()
        .and_then(|lang| lang.compile_command())
        .unwrap_or("")
}

//! Benchmark requests.

use crate::language::Language;
use std::collections::BTreeMap;

/// Placeholder prefixes produced upstream when no real source exists for a slot.
const PLACEHOLDER_PREFIXES: &[&str] = &["// No ", "// Error porting to "];

/// Placeholder fragment shown in editors before any code was generated.
const PLACEHOLDER_EDITOR_HINT: &str = "code will appear here";

/// Source payload for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Source {
    /// No real source was provided; the slot is not attempted.
    #[default]
    NotProvided,
    /// Source code to compile and run.
    Code(String),
}

impl Source {
    /// Classify a free-form payload.
    ///
    /// Blank text and the known upstream placeholder comments map to
    /// [`Source::NotProvided`]. Any other text, including real programs that
    /// start with a comment, is kept as code.
    pub fn from_payload(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim_start();
        if trimmed.is_empty() || is_placeholder(trimmed) {
            Self::NotProvided
        } else {
            Self::Code(text)
        }
    }

    /// The code, if provided.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NotProvided => None,
            Self::Code(code) => Some(code),
        }
    }
}

fn is_placeholder(text: &str) -> bool {
    let first_line = text.lines().next().unwrap_or_default();
    if PLACEHOLDER_PREFIXES.iter().any(|p| first_line.starts_with(p)) {
        return true;
    }
    first_line.starts_with("//") && first_line.contains(PLACEHOLDER_EDITOR_HINT) && text.lines().count() == 1
}

/// A request to benchmark up to four sources, one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchmarkRequest {
    sources: BTreeMap<Language, Source>,
}

impl BenchmarkRequest {
    /// Create an empty request (every slot not provided).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source for a slot.
    pub fn with_source(mut self, language: Language, source: Source) -> Self {
        self.sources.insert(language, source);
        self
    }

    /// Set a slot from a free-form payload, see [`Source::from_payload`].
    pub fn with_payload(self, language: Language, text: impl Into<String>) -> Self {
        self.with_source(language, Source::from_payload(text))
    }

    /// Build a request from the four payloads in the order python, cpp, java, rust.
    pub fn from_payloads(
        python: impl Into<String>,
        cpp: impl Into<String>,
        java: impl Into<String>,
        rust: impl Into<String>,
    ) -> Self {
        Self::new()
            .with_payload(Language::Python, python)
            .with_payload(Language::Cpp, cpp)
            .with_payload(Language::Java, java)
            .with_payload(Language::Rust, rust)
    }

    /// Source for a slot; unset slots are not provided.
    pub fn source(&self, language: Language) -> &Source {
        static NOT_PROVIDED: Source = Source::NotProvided;
        self.sources.get(&language).unwrap_or(&NOT_PROVIDED)
    }

    /// Slots that carry code, with their code.
    pub fn present(&self) -> impl Iterator<Item = (Language, &str)> {
        self.sources
            .iter()
            .filter_map(|(lang, source)| source.code().map(|code| (*lang, code)))
    }
}

//! Result channel parser.
//!
//! The runner prints one JSON object as the last line of its output, but the
//! captured container stream can carry diagnostics around it. Extraction uses
//! two ordered strategies:
//!
//! 1. Line scan: walk lines from the end; the first trimmed line starting
//!    with `{` that parses wins.
//! 2. Block scan: join the lines from the first one containing `{` through
//!    the last one containing `}` and parse the block.

use crate::language::Language;
use crate::result::{BenchmarkResult, LanguageResult};
use std::collections::BTreeMap;

type ResultMap = BTreeMap<Language, LanguageResult>;

/// Extract the benchmark result from captured output.
///
/// Returns `None` when neither strategy yields a valid result object.
pub fn extract(raw_output: &str) -> Option<BenchmarkResult> {
    let lines: Vec<&str> = raw_output.trim().lines().collect();

    if let Some(map) = scan_lines(&lines) {
        tracing::debug!(languages = map.len(), "Parsed result from line");
        return Some(BenchmarkResult::from_languages(map));
    }

    match scan_block(&lines) {
        Some(map) => {
            tracing::debug!(languages = map.len(), "Parsed result from block");
            Some(BenchmarkResult::from_languages(map))
        }
        None => {
            tracing::warn!(
                output_len = raw_output.len(),
                "No result object found in output"
            );
            None
        }
    }
}

fn scan_lines(lines: &[&str]) -> Option<ResultMap> {
    for line in lines.iter().rev() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        match serde_json::from_str::<ResultMap>(line) {
            Ok(map) => return Some(map),
            Err(e) => tracing::trace!(error = %e, "Line is not a result object"),
        }
    }
    None
}

fn scan_block(lines: &[&str]) -> Option<ResultMap> {
    let start = lines.iter().position(|line| line.contains('{'))?;
    let end = lines.iter().rposition(|line| line.contains('}'))?;
    if end < start {
        return None;
    }

    let block = lines[start..=end].join("\n");
    serde_json::from_str::<ResultMap>(&block)
        .map_err(|e| tracing::trace!(error = %e, "Block is not a result object"))
        .ok()
}

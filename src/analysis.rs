//! Best-effort extraction of counts from code2flow's free-text output.
//!
//! The output format is not specified by code2flow. Every field that cannot be
//! recovered stays at zero and `raw_output` is always the untouched stdout.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static FILE_COUNT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Processing\s+(\d+)\s+source file").ok());

static FUNCTION_COUNT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:functions?|nodes?)\b").ok());

static CLASS_COUNT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:class(?:es)?|groups?)\b").ok());

/// Summary returned by `analyze_code_complexity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexitySummary {
    pub file_count: u64,
    pub function_count: u64,
    pub class_count: u64,
    pub raw_output: String,
}

/// Parses the stdout of an analysis-only run. Never fails.
pub fn parse_analysis_output(stdout: &str) -> ComplexitySummary {
    ComplexitySummary {
        file_count: first_count(&FILE_COUNT, stdout, "file_count"),
        function_count: first_count(&FUNCTION_COUNT, stdout, "function_count"),
        class_count: first_count(&CLASS_COUNT, stdout, "class_count"),
        raw_output: stdout.to_string(),
    }
}

/// Returns the first captured integer on any line, or 0.
fn first_count(pattern: &Option<Regex>, stdout: &str, field: &str) -> u64 {
    let Some(pattern) = pattern else {
        return 0;
    };
    let count = stdout
        .lines()
        .filter_map(|line| pattern.captures(line))
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()));

    match count {
        Some(count) => count,
        None => {
            debug!(field, "could not extract count from analysis output");
            0
        }
    }
}

//! Keyword summary of error lines in collected log text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result key under which log collectors publish the summary.
pub const ERROR_PATTERNS_KEY: &str = "error_patterns";

const MAX_SAMPLES: usize = 5;

const PATTERNS: &[(&str, &[&str])] = &[
    ("error", &["error"]),
    ("exception", &["exception", "traceback", "panic"]),
    ("timeout", &["timeout", "timed out", "deadline exceeded"]),
    ("throttling", &["throttl", "rate exceeded", "too many requests"]),
    ("access_denied", &["accessdenied", "access denied", "unauthorized", "forbidden"]),
];

/// Counts of error-like lines across log output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPatternSummary {
    /// Lines matching at least one pattern.
    pub total_errors: usize,
    /// Matching lines per pattern; a line can count towards several.
    pub by_pattern: BTreeMap<String, usize>,
    /// First few matching lines, trimmed.
    pub samples: Vec<String>,
}

/// Scan log texts line by line for known error patterns.
pub fn analyze_error_patterns<'a>(texts: impl IntoIterator<Item = &'a str>) -> ErrorPatternSummary {
    let mut summary = ErrorPatternSummary::default();

    for line in texts.into_iter().flat_map(str::lines) {
        let lowered = line.to_lowercase();
        let mut matched = false;
        for (name, needles) in PATTERNS {
            if needles.iter().any(|n| lowered.contains(n)) {
                *summary.by_pattern.entry(name.to_string()).or_insert(0) += 1;
                matched = true;
            }
        }
        if matched {
            summary.total_errors += 1;
            if summary.samples.len() < MAX_SAMPLES {
                summary.samples.push(line.trim().to_string());
            }
        }
    }

    summary
}

//! Reduce a detection to the set of line numbers it flagged.
//!
//! Two strategies, tried per finding:
//!
//! 1. [`ExtractionStrategy::Structured`]: the finding's `vulnerable_lines`.
//! 2. [`ExtractionStrategy::LocationHeuristic`]: best-effort regex parsing of
//!    the free-text `location`. This is lossy: it recognises `line N`,
//!    `lines N-M`, `LN` and `:N` and nothing else, and can pick up numbers
//!    that are not line numbers (a column after `file:line:col`, say).

use crate::detection::{Detection, ReportedFinding};
use fancy_regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Ranges wider than this in prose are not expanded; only their endpoints
/// are kept.
const MAX_RANGE_SPAN: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    Structured,
    LocationHeuristic,
    None,
}

/// Flagged lines plus how each finding contributed to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineExtraction {
    pub lines: Vec<u32>,
    pub structured_findings: usize,
    pub heuristic_findings: usize,
    pub empty_findings: usize,
}

static RANGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\blines?\s+(\d+)\s*(?:-|–|—|to)\s*(\d+)").ok());

static SINGLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\blines?\s+(\d+)\b(?!\s*(?:-|–|—|to)\s*\d)",
        r"\bL(\d+)\b",
        r":(\d+)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Sorted, deduplicated line numbers flagged anywhere in `detection`.
pub fn extract_lines_from_detection(detection: &Detection) -> Vec<u32> {
    extract(detection).lines
}

pub fn extract(detection: &Detection) -> LineExtraction {
    let mut lines = BTreeSet::new();
    let mut out = LineExtraction::default();

    for finding in &detection.prediction.vulnerabilities {
        match extract_finding(finding, &mut lines) {
            ExtractionStrategy::Structured => out.structured_findings += 1,
            ExtractionStrategy::LocationHeuristic => out.heuristic_findings += 1,
            ExtractionStrategy::None => out.empty_findings += 1,
        }
    }

    out.lines = lines.into_iter().collect();
    out
}

fn extract_finding(finding: &ReportedFinding, into: &mut BTreeSet<u32>) -> ExtractionStrategy {
    let structured: Vec<u32> = finding
        .vulnerable_lines
        .iter()
        .flatten()
        .filter_map(|r| r.as_line())
        .collect();
    if !structured.is_empty() {
        into.extend(structured);
        return ExtractionStrategy::Structured;
    }

    let Some(location) = finding.location.as_deref() else {
        return ExtractionStrategy::None;
    };
    let parsed = parse_location(location);
    if parsed.is_empty() {
        debug!(location, "no line hints in location text");
        return ExtractionStrategy::None;
    }
    debug!(location, lines = ?parsed, "lines recovered from location text");
    into.extend(parsed);
    ExtractionStrategy::LocationHeuristic
}

/// Line numbers mentioned in free text, sorted and deduplicated.
pub fn parse_location(text: &str) -> BTreeSet<u32> {
    let mut lines = BTreeSet::new();

    if let Some(range) = RANGE.as_ref() {
        for caps in range.captures_iter(text).filter_map(|c| c.ok()) {
            let (Some(a), Some(b)) = (number(caps.get(1)), number(caps.get(2))) else {
                continue;
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            if hi - lo > MAX_RANGE_SPAN {
                warn!(lo, hi, "range too wide to expand, keeping endpoints");
                lines.extend([lo, hi]);
                continue;
            }
            lines.extend(lo..=hi);
        }
    }

    for pattern in SINGLE.iter() {
        for caps in pattern.captures_iter(text).filter_map(|c| c.ok()) {
            if let Some(n) = number(caps.get(1)) {
                lines.insert(n);
            }
        }
    }

    lines
}

fn number(m: Option<fancy_regex::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

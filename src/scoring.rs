//! Line matching and per-sample scoring.
//!
//! Every metric on [`SampleAnalysis`] is computed from the stored counts on
//! each call (and again when serialized); none is stored.

use crate::annotation::{CodeActMatch, GroundTruthTotals, LineIndex, SecurityFunction, Variant};
use crate::detection::Detection;
use crate::extract;
use serde::{Serialize, Serializer};

/// Hits per security role among the flagged lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FunctionCounts {
    pub root_cause: usize,
    pub secondary_vuln: usize,
    pub prereq: usize,
    pub benign: usize,
    pub decoy: usize,
    pub unrelated: usize,
}

impl FunctionCounts {
    pub fn record(&mut self, function: SecurityFunction) {
        match function {
            SecurityFunction::RootCause => self.root_cause += 1,
            SecurityFunction::SecondaryVuln => self.secondary_vuln += 1,
            SecurityFunction::Prereq => self.prereq += 1,
            SecurityFunction::Benign => self.benign += 1,
            SecurityFunction::Decoy => self.decoy += 1,
            SecurityFunction::Unrelated => self.unrelated += 1,
        }
    }

    pub fn get(&self, function: SecurityFunction) -> usize {
        match function {
            SecurityFunction::RootCause => self.root_cause,
            SecurityFunction::SecondaryVuln => self.secondary_vuln,
            SecurityFunction::Prereq => self.prereq,
            SecurityFunction::Benign => self.benign,
            SecurityFunction::Decoy => self.decoy,
            SecurityFunction::Unrelated => self.unrelated,
        }
    }

    pub fn matched(&self) -> usize {
        SecurityFunction::ALL.iter().map(|f| self.get(*f)).sum()
    }
}

/// `numerator / denominator`, or 0.0 when the denominator is zero.
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleAnalysis {
    pub variant: Variant,
    pub sample_id: String,
    pub detector: String,
    pub lines_flagged: Vec<u32>,
    pub matches: Vec<CodeActMatch>,
    pub counts: FunctionCounts,
    pub totals: GroundTruthTotals,
    pub heuristic_findings: usize,
    pub verdict_vulnerable: bool,
}

impl SampleAnalysis {
    pub fn root_cause_hits(&self) -> usize {
        self.counts.root_cause
    }

    pub fn decoy_hits(&self) -> usize {
        self.counts.decoy
    }

    pub fn root_cause_found(&self) -> bool {
        self.counts.root_cause > 0
    }

    pub fn root_cause_precision(&self) -> f64 {
        ratio(self.counts.root_cause, self.lines_flagged.len())
    }

    pub fn root_cause_recall(&self) -> f64 {
        ratio(self.counts.root_cause, self.totals.total_root_causes)
    }

    /// Fraction of the sample's decoy lines the detector flagged.
    pub fn decoy_trap_rate(&self) -> f64 {
        ratio(self.counts.decoy, self.totals.total_decoys)
    }

    pub fn benign_flag_rate(&self) -> f64 {
        ratio(self.counts.benign, self.lines_flagged.len())
    }

    /// Root-cause plus secondary-vulnerability hits over all flagged lines.
    pub fn precision(&self) -> f64 {
        ratio(
            self.counts.root_cause + self.counts.secondary_vuln,
            self.lines_flagged.len(),
        )
    }

    /// Flagged lines with no code-act. Not used by any metric numerator.
    pub fn unmatched_lines(&self) -> Vec<u32> {
        self.lines_flagged
            .iter()
            .copied()
            .filter(|line| !self.matches.iter().any(|m| m.line == *line))
            .collect()
    }
}

#[derive(Serialize)]
struct SampleRecord<'a> {
    variant: Variant,
    sample_id: &'a str,
    detector: &'a str,
    lines_flagged: &'a [u32],
    unmatched_lines: Vec<u32>,
    matches: &'a [CodeActMatch],
    counts: &'a FunctionCounts,
    #[serde(flatten)]
    totals: &'a GroundTruthTotals,
    heuristic_findings: usize,
    verdict_vulnerable: bool,
    root_cause_found: bool,
    root_cause_precision: f64,
    root_cause_recall: f64,
    decoy_trap_rate: f64,
    benign_flag_rate: f64,
    precision: f64,
}

impl Serialize for SampleAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SampleRecord {
            variant: self.variant,
            sample_id: &self.sample_id,
            detector: &self.detector,
            lines_flagged: &self.lines_flagged,
            unmatched_lines: self.unmatched_lines(),
            matches: &self.matches,
            counts: &self.counts,
            totals: &self.totals,
            heuristic_findings: self.heuristic_findings,
            verdict_vulnerable: self.verdict_vulnerable,
            root_cause_found: self.root_cause_found(),
            root_cause_precision: self.root_cause_precision(),
            root_cause_recall: self.root_cause_recall(),
            decoy_trap_rate: self.decoy_trap_rate(),
            benign_flag_rate: self.benign_flag_rate(),
            precision: self.precision(),
        }
        .serialize(serializer)
    }
}

/// Classify every line `detection` flagged against `index`.
///
/// Lines without a code-act produce no match and leave every counter
/// untouched. Ground-truth totals come from the index alone.
pub fn analyze_sample(index: &LineIndex, detector: &str, detection: &Detection) -> SampleAnalysis {
    let extraction = extract::extract(detection);

    let mut counts = FunctionCounts::default();
    let matches: Vec<CodeActMatch> = extraction
        .lines
        .iter()
        .filter_map(|line| index.lookup(*line))
        .inspect(|m| counts.record(m.security_function))
        .collect();

    SampleAnalysis {
        variant: index.variant(),
        sample_id: index.sample_id().to_string(),
        detector: detector.to_string(),
        lines_flagged: extraction.lines,
        matches,
        counts,
        totals: index.ground_truth(),
        heuristic_findings: extraction.heuristic_findings,
        verdict_vulnerable: detection.says_vulnerable(),
    }
}

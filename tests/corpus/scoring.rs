use super::expected::{assert_close, corpus};
use codeact_eval::annotation::Variant;

#[test]
fn decoy_shared_with_base_counts_as_trap() {
    let analysis = corpus().analyze(Variant::Tr, "tr_001", "alpha").unwrap();
    assert_eq!(analysis.lines_flagged, [5, 10]);
    assert!(analysis.root_cause_found());
    assert_eq!(analysis.decoy_hits(), 1);
    assert_close(analysis.decoy_trap_rate(), 0.5, "decoy_trap_rate");
    assert_close(analysis.root_cause_recall(), 1.0, "root_cause_recall");
    assert_close(analysis.root_cause_precision(), 0.5, "root_cause_precision");
    assert!(analysis.verdict_vulnerable);
}

#[test]
fn pattern_matcher_misses_base_vulnerability() {
    let analysis = corpus().analyze(Variant::Tr, "tr_001", "beta").unwrap();
    assert!(!analysis.root_cause_found());
    assert_close(analysis.decoy_trap_rate(), 1.0, "decoy_trap_rate");
    assert_close(analysis.precision(), 0.0, "precision");
}

#[test]
fn prose_location_is_parsed() {
    let alpha = corpus().analyze(Variant::Ms, "ms_002", "alpha").unwrap();
    assert_eq!(alpha.lines_flagged, [30, 31]);
    assert_eq!(alpha.heuristic_findings, 1);
    assert_close(alpha.root_cause_recall(), 1.0, "alpha recall");

    let beta = corpus().analyze(Variant::Ms, "ms_002", "beta").unwrap();
    assert_eq!(beta.lines_flagged, [30]);
    assert_close(beta.root_cause_recall(), 0.5, "beta recall");
}

#[test]
fn benign_flag_lowers_precision() {
    let analysis = corpus().analyze(Variant::Ms, "ms_001", "alpha").unwrap();
    assert_eq!(analysis.counts.root_cause, 1);
    assert_eq!(analysis.counts.benign, 1);
    assert_close(analysis.benign_flag_rate(), 0.5, "benign_flag_rate");
    assert_close(analysis.precision(), 0.5, "precision");
    assert!(analysis.unmatched_lines().is_empty());
}

#[test]
fn quiet_detector_on_patched_code() {
    let analysis = corpus().analyze(Variant::Df, "df_001", "alpha").unwrap();
    assert!(analysis.lines_flagged.is_empty());
    assert!(!analysis.root_cause_found());
    assert!(!analysis.verdict_vulnerable);
    assert_close(analysis.precision(), 0.0, "precision");
}

#[test]
fn scoring_is_repeatable() {
    let corpus = corpus();
    let first = corpus.analyze(Variant::Tr, "tr_002", "alpha").unwrap();
    let second = corpus.analyze(Variant::Tr, "tr_002", "alpha").unwrap();
    assert_eq!(first, second);
}

#[test]
fn detection_failures_carry_their_kind() {
    let corpus = corpus();
    let missing = corpus.analyze(Variant::Tr, "tr_002", "beta").unwrap_err();
    assert_eq!(missing.kind(), "detection_not_found");
    let malformed = corpus.analyze(Variant::Df, "df_001", "beta").unwrap_err();
    assert_eq!(malformed.kind(), "detection_parse");
}

use codeact_eval::annotation::{AnnotationStore, Variant};
use codeact_eval::batch::Corpus;
use codeact_eval::config::Config;
use codeact_eval::detection::DetectionStore;
use std::path::PathBuf;

pub fn corpus_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/corpus")
}

pub fn corpus() -> Corpus {
    let root = corpus_dir();
    Corpus::new(
        AnnotationStore::new(root.join("annotations")),
        DetectionStore::new(root.join("detections")),
    )
}

pub fn config(output: PathBuf) -> Config {
    let root = corpus_dir();
    let mut config = Config::default();
    config.corpus.annotations_dir = root.join("annotations");
    config.corpus.detections_dir = root.join("detections");
    config.output.dir = output;
    config
}

pub fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "{what}: expected {expected}, got {actual}"
    );
}

pub fn assert_close_opt(actual: Option<f64>, expected: Option<f64>, what: &str) {
    match (actual, expected) {
        (Some(a), Some(e)) => assert_close(a, e, what),
        (a, e) => assert_eq!(a, e, "{what}"),
    }
}

/// Hand-computed composite indices for each fixture detector.
pub struct ExpectedDetector {
    pub name: &'static str,
    pub evaluated: &'static [(Variant, usize)],
    pub skipped: &'static [(&'static str, &'static str)],
    pub contamination_index: Option<f64>,
    pub decoy_resistance: Option<f64>,
    pub fix_recognition_rate: Option<f64>,
    pub understanding_score: Option<f64>,
    pub pattern_matching_index: Option<f64>,
}

pub const EXPECTED: &[ExpectedDetector] = &[
    // Finds every root cause, falls for one of two decoys on tr_001 and
    // stays quiet on the patched sample.
    ExpectedDetector {
        name: "alpha",
        evaluated: &[(Variant::Ms, 2), (Variant::Tr, 2), (Variant::Df, 1)],
        skipped: &[],
        contamination_index: Some(0.0),
        decoy_resistance: Some(0.75),
        fix_recognition_rate: Some(1.0),
        understanding_score: Some(0.925),
        pattern_matching_index: Some(0.25),
    },
    // Flags the decoys instead of the base vulnerability. tr_002 has no
    // output and df_001 is truncated JSON, so df is unmeasured and every
    // score that needs it is absent.
    ExpectedDetector {
        name: "beta",
        evaluated: &[(Variant::Ms, 2), (Variant::Tr, 1), (Variant::Df, 0)],
        skipped: &[
            ("tr_002", "detection_not_found"),
            ("df_001", "detection_parse"),
        ],
        contamination_index: Some(1.0),
        decoy_resistance: Some(0.0),
        fix_recognition_rate: None,
        understanding_score: None,
        pattern_matching_index: Some(0.5),
    },
];

/// tr_003 declares `injections` as a scalar.
pub const BROKEN_ANNOTATION: (Variant, &str) = (Variant::Tr, "tr_003");

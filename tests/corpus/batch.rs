use super::expected::{BROKEN_ANNOTATION, EXPECTED, assert_close, assert_close_opt, config};
use codeact_eval::annotation::Variant;
use codeact_eval::batch::run_batch;
use codeact_eval::config::Config;
use codeact_eval::output;

#[tokio::test]
async fn batch_matches_hand_computed_indices() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_batch(&config(dir.path().to_path_buf())).await.unwrap();

    let names: Vec<&str> = report.detectors.iter().map(|d| d.detector.as_str()).collect();
    assert_eq!(names, ["alpha", "beta"]);

    for expected in EXPECTED {
        let detector = report.detector(expected.name).unwrap();
        let a = &detector.analysis;
        for (variant, count) in expected.evaluated {
            assert_eq!(
                detector.samples_evaluated.get(variant).copied(),
                Some(*count),
                "{} {variant} sample count",
                expected.name
            );
            assert_eq!(a.metrics(*variant).sample_count, *count);
        }

        let skipped: Vec<(&str, &str)> = detector
            .skipped
            .iter()
            .map(|s| (s.sample_id.as_str(), s.kind))
            .collect();
        assert_eq!(skipped.len(), expected.skipped.len(), "{}", expected.name);
        for skip in expected.skipped {
            assert!(skipped.contains(skip), "{}: missing skip {skip:?}", expected.name);
        }

        let name = expected.name;
        assert_close_opt(a.contamination_index(), expected.contamination_index, name);
        assert_close_opt(a.decoy_resistance(), expected.decoy_resistance, name);
        assert_close_opt(a.fix_recognition_rate(), expected.fix_recognition_rate, name);
        assert_close_opt(a.understanding_score(), expected.understanding_score, name);
        assert_close_opt(a.pattern_matching_index(), expected.pattern_matching_index, name);
    }

    let (variant, id) = BROKEN_ANNOTATION;
    assert_eq!(report.annotation_skips.len(), 1);
    assert_eq!(report.annotation_skips[0].variant, variant);
    assert_eq!(report.annotation_skips[0].sample_id, id);
    assert!(report.annotation_skips[0].detector.is_none());

    // tr_003 is excluded for both detectors, plus beta's two detection failures
    assert_eq!(report.succeeded, 8);
    assert_eq!(report.skipped_count, 4);
    assert_eq!(report.skipped().count(), 3);
}

#[tokio::test]
async fn fully_skipped_variant_earns_no_credit() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_batch(&config(dir.path().to_path_buf())).await.unwrap();

    // alpha has df data, beta's only df output is unreadable
    let alpha = &report.detector("alpha").unwrap().analysis;
    assert!(alpha.unmeasured().is_empty());
    assert_eq!(alpha.fix_recognition_rate(), Some(1.0));

    let beta = &report.detector("beta").unwrap().analysis;
    assert_eq!(beta.unmeasured(), [Variant::Df]);
    assert!(beta.measured(Variant::Df).is_none());
    assert_eq!(beta.fix_recognition_rate(), None);
    assert_eq!(beta.understanding_score(), None);
    assert!(beta.decoy_resistance().is_some());
}

#[tokio::test]
async fn fully_skipped_trojan_variant_blocks_contamination() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path().to_path_buf());
    config.evaluation.detectors = vec!["beta".into()];
    config.corpus.samples = vec!["ms_001".into(), "tr_002".into(), "df_001".into()];

    let report = run_batch(&config).await.unwrap();
    let beta = &report.detectors[0].analysis;
    assert_eq!(beta.ms_metrics.sample_count, 1);
    assert_eq!(beta.unmeasured(), [Variant::Tr, Variant::Df]);
    assert_eq!(beta.contamination_index(), None);
    assert_eq!(beta.decoy_resistance(), None);
    assert_eq!(beta.pattern_matching_index(), None);
    assert_eq!(beta.understanding_score(), None);
}

#[tokio::test]
async fn averages_exclude_skipped_samples() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_batch(&config(dir.path().to_path_buf())).await.unwrap();

    let alpha = &report.detector("alpha").unwrap().analysis;
    assert_close(alpha.ms_metrics.avg_precision, 0.75, "alpha ms precision");
    assert_close(alpha.ms_metrics.avg_benign_flag_rate, 0.25, "alpha ms benign");
    assert_close(alpha.tr_metrics.avg_decoy_trap_rate, 0.25, "alpha tr trap");
    assert_close(alpha.df_metrics.verdict_vulnerable_rate, 0.0, "alpha df verdict");

    // beta's only scored tr sample is tr_001; the missing tr_002 is not a zero
    let beta = &report.detector("beta").unwrap().analysis;
    assert_close(beta.tr_metrics.avg_decoy_trap_rate, 1.0, "beta tr trap");
    assert_eq!(beta.df_metrics, Default::default());
}

#[tokio::test]
async fn configured_filters_narrow_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path().to_path_buf());
    config.evaluation.detectors = vec!["alpha".into()];
    config.corpus.variants = vec![Variant::Tr];
    config.corpus.samples = vec!["tr_001".into(), "tr_404".into()];

    let report = run_batch(&config).await.unwrap();
    assert_eq!(report.detectors.len(), 1);
    assert_eq!(report.variants, [Variant::Tr]);
    assert_eq!(report.succeeded, 1);

    let skip = &report.annotation_skips[0];
    assert_eq!(skip.sample_id, "tr_404");
    assert_eq!(skip.kind, "annotation_not_found");

    // unconfigured variants are unmeasured, not zero
    let alpha = &report.detectors[0];
    assert_eq!(alpha.analysis.ms_metrics.sample_count, 0);
    assert_eq!(alpha.analysis.contamination_index(), None);
    assert!(alpha.analysis.decoy_resistance().is_some());
}

#[tokio::test]
async fn unknown_detector_is_skipped_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path().to_path_buf());
    config.evaluation.detectors = vec!["gamma".into()];

    let report = run_batch(&config).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert!(
        report.detectors[0]
            .skipped
            .iter()
            .all(|s| s.kind == "detection_not_found")
    );
}

#[tokio::test]
async fn invalid_weights_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path().to_path_buf());
    config.weights.tr_detection = 0.9;
    assert!(run_batch(&config).await.is_err());
}

#[tokio::test]
async fn detector_names_cannot_escape_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path().join("out"));
    config.evaluation.detectors = vec!["../alpha".into()];
    let err = run_batch(&config).await.unwrap_err();
    assert!(err.to_string().contains("../alpha"));
    assert!(!dir.path().join("alpha").exists());
}

#[tokio::test]
async fn results_are_written_per_detector() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path().to_path_buf());
    let report = run_batch(&config).await.unwrap();

    let summary = output::write_batch(dir.path(), &report, true).unwrap();
    assert_eq!(summary, dir.path().join(output::BATCH_SUMMARY_FILE));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["succeeded"], 8);
    assert_eq!(json["detectors"][0]["detector"], "alpha");
    let score = json["detectors"][0]["analysis"]["understanding_score"]
        .as_f64()
        .unwrap();
    assert_close(score, 0.925, "serialized understanding_score");
    assert!(json["detectors"][1]["analysis"]["understanding_score"].is_null());
    assert_eq!(
        json["detectors"][1]["analysis"]["unmeasured_variants"],
        serde_json::json!(["df"])
    );

    assert!(dir.path().join("alpha").join(output::DETECTOR_SUMMARY_FILE).is_file());
    assert!(dir.path().join("alpha/tr/tr_001.json").is_file());
    assert!(dir.path().join("beta/ms/ms_002.json").is_file());
    assert!(!dir.path().join("beta/tr/tr_002.json").exists());

    let sample: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("alpha/tr/tr_001.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(sample["decoy_trap_rate"], 0.5);
    assert_eq!(sample["total_decoys"], 2);
}

#[tokio::test]
async fn leaderboard_ranks_by_understanding() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_batch(&config(dir.path().to_path_buf())).await.unwrap();
    let table = output::render_leaderboard(&report);

    let alpha = table.find("alpha").unwrap();
    let beta = table.find("\nbeta").unwrap();
    assert!(alpha < beta);
    assert!(table.contains("8 detector/sample pairs scored, 4 skipped"));
    let beta_row = table.lines().find(|l| l.starts_with("beta")).unwrap();
    assert!(beta_row.contains("n/a"));
    assert!(beta_row.ends_with("(no scored df)"));
    assert!(table.contains("skipped tr/tr_003"));
    assert!(table.contains("skipped df/df_001 (beta)"));
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codeact.toml");
    std::fs::write(
        &path,
        r#"
[corpus]
annotations_dir = "a"
detections_dir = "d"
variants = ["ms", "df"]

[weights]
tr_detection = 0.5
decoy_resistance = 0.25
fix_recognition = 0.25
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.corpus.variants, [Variant::Ms, Variant::Df]);
    assert_close(config.weights.tr_detection, 0.5, "tr_detection");
    assert!(config.output.write_samples);
}

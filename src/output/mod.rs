use crate::annotation::Variant;
use crate::batch::{BatchReport, DetectorReport};
use anyhow::{Context, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BATCH_SUMMARY_FILE: &str = "batch_summary.json";
pub const DETECTOR_SUMMARY_FILE: &str = "summary.json";

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write `<dir>/<detector>/summary.json` and, if `write_samples`, one file per
/// scored sample under `<dir>/<detector>/<variant>/`.
pub fn write_detector(
    dir: &Path,
    report: &DetectorReport,
    write_samples: bool,
) -> Result<PathBuf> {
    let detector_dir = dir.join(&report.detector);
    let summary = detector_dir.join(DETECTOR_SUMMARY_FILE);
    write_json(&summary, report)?;

    if write_samples {
        for sample in &report.samples {
            let path = detector_dir
                .join(sample.variant.as_str())
                .join(format!("{}.json", sample.sample_id));
            write_json(&path, sample)?;
        }
    }
    Ok(summary)
}

/// Write every detector's outputs plus `<dir>/batch_summary.json`.
pub fn write_batch(dir: &Path, report: &BatchReport, write_samples: bool) -> Result<PathBuf> {
    for detector in &report.detectors {
        write_detector(dir, detector, write_samples)?;
    }
    let summary = dir.join(BATCH_SUMMARY_FILE);
    write_json(&summary, report)?;
    info!(
        dir = %dir.display(),
        detectors = report.detectors.len(),
        "results written"
    );
    Ok(summary)
}

/// Fixed-width ranking table, best understanding score first. Detectors
/// without a score (some variant had no scored sample) are listed last and
/// marked with the variants they are missing.
pub fn render_leaderboard(report: &BatchReport) -> String {
    let mut rows: Vec<&DetectorReport> = report.detectors.iter().collect();
    rows.sort_by(|a, b| {
        match (a.analysis.understanding_score(), b.analysis.understanding_score()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.detector.cmp(&b.detector))
    });

    let width = rows
        .iter()
        .map(|r| r.detector.len())
        .max()
        .unwrap_or(0)
        .max("detector".len());

    let mut out = format!(
        "{:<width$}  {:>7}  {:>7}  {:>7}  {:>7}  {:>7}  {:>7}\n",
        "detector", "tr_tdr", "contam", "decoy_r", "fix_rec", "underst", "pattern"
    );
    for r in rows {
        let a = &r.analysis;
        let tdr = a.measured(Variant::Tr).map(|m| m.root_cause_found_rate);
        out.push_str(&format!(
            "{:<width$}  {:>7}  {:>7}  {:>7}  {:>7}  {:>7}  {:>7}",
            r.detector,
            cell(tdr),
            cell(a.contamination_index()),
            cell(a.decoy_resistance()),
            cell(a.fix_recognition_rate()),
            cell(a.understanding_score()),
            cell(a.pattern_matching_index()),
        ));
        let missing = a.unmeasured();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(Variant::as_str).collect();
            out.push_str(&format!("  (no scored {})", names.join("/")));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "\n{} detector/sample pairs scored, {} skipped\n",
        report.succeeded, report.skipped_count
    ));
    for skip in report.skipped() {
        out.push_str(&format!(
            "  skipped {}/{}{}: {}\n",
            skip.variant,
            skip.sample_id,
            skip.detector
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default(),
            skip.reason
        ));
    }
    out
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"))
}

//! Batch driver: score every configured detector on every annotated sample.
//!
//! Annotation indices are built once per `(variant, sample_id)` and shared
//! read-only. Each detector is then scored on its own blocking task. A sample
//! that fails (missing or unreadable annotation, missing or malformed
//! detection) is recorded as a [`SkippedSample`] and left out of every
//! average; it never counts as a zero score.

use crate::aggregate::{CrossVariantAnalysis, UnderstandingWeights, VariantMetrics};
use crate::annotation::{AnnotationStore, LineIndex, Variant};
use crate::config::Config;
use crate::detection::DetectionStore;
use crate::error::{Error, Result};
use crate::scoring::{self, SampleAnalysis};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// A sample left out of aggregation, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSample {
    /// `None` when the annotation itself failed, excluding the sample for
    /// every detector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<String>,
    pub variant: Variant,
    pub sample_id: String,
    pub kind: &'static str,
    pub reason: String,
}

impl SkippedSample {
    fn new(detector: Option<&str>, variant: Variant, sample_id: &str, error: &Error) -> Self {
        Self {
            detector: detector.map(str::to_string),
            variant,
            sample_id: sample_id.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Annotation indices for one variant.
#[derive(Debug, Clone)]
pub struct VariantIndices {
    pub variant: Variant,
    pub indices: Vec<LineIndex>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorReport {
    pub detector: String,
    pub analysis: CrossVariantAnalysis,
    pub samples_evaluated: BTreeMap<Variant, usize>,
    pub skipped: Vec<SkippedSample>,
    #[serde(skip)]
    pub samples: Vec<SampleAnalysis>,
}

/// `succeeded` and `skipped_count` both count `(detector, sample)` pairs: an
/// annotation failure excludes its sample for every detector and so counts
/// once per detector, while `annotation_skips` lists it once.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub variants: Vec<Variant>,
    pub succeeded: usize,
    pub skipped_count: usize,
    pub detectors: Vec<DetectorReport>,
    pub annotation_skips: Vec<SkippedSample>,
}

impl BatchReport {
    /// Every skip in the run, annotation-level first.
    pub fn skipped(&self) -> impl Iterator<Item = &SkippedSample> {
        self.annotation_skips
            .iter()
            .chain(self.detectors.iter().flat_map(|d| d.skipped.iter()))
    }

    pub fn detector(&self, name: &str) -> Option<&DetectorReport> {
        self.detectors.iter().find(|d| d.detector == name)
    }
}

/// The on-disk corpus: annotations plus detector outputs.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub annotations: AnnotationStore,
    pub detections: DetectionStore,
}

impl Corpus {
    pub fn new(annotations: AnnotationStore, detections: DetectionStore) -> Self {
        Self {
            annotations,
            detections,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AnnotationStore::new(&config.corpus.annotations_dir),
            DetectionStore::new(&config.corpus.detections_dir),
        )
    }

    /// Score one `(variant, sample, detector)` triple.
    pub fn analyze(
        &self,
        variant: Variant,
        sample_id: &str,
        detector: &str,
    ) -> Result<SampleAnalysis> {
        let index = self.annotations.load(variant, sample_id)?;
        let detection = self.detections.load(detector, variant, sample_id)?;
        Ok(scoring::analyze_sample(&index, detector, &detection))
    }

    /// Build indices for every requested sample. `samples` empty means every
    /// annotated sample of the variant.
    pub fn load_indices(
        &self,
        variants: &[Variant],
        samples: &[String],
    ) -> Result<(Vec<VariantIndices>, Vec<SkippedSample>)> {
        let mut loaded = Vec::new();
        let mut skipped = Vec::new();

        for &variant in variants {
            let ids = if samples.is_empty() {
                self.annotations.sample_ids(variant)?
            } else {
                samples.to_vec()
            };

            let mut indices = Vec::with_capacity(ids.len());
            for id in &ids {
                match self.annotations.load(variant, id) {
                    Ok(index) => indices.push(index),
                    Err(e) => {
                        warn!(variant = %variant, sample = %id, error = %e, "skipping sample");
                        skipped.push(SkippedSample::new(None, variant, id, &e));
                    }
                }
            }
            info!(
                variant = %variant,
                loaded = indices.len(),
                requested = ids.len(),
                "annotations loaded"
            );
            loaded.push(VariantIndices { variant, indices });
        }

        Ok((loaded, skipped))
    }
}

/// Score one detector against pre-built indices. A variant absent from
/// `variants`, or with every sample skipped, is left unmeasured
/// (`sample_count == 0`) and the composites that need it come out as `None`.
pub fn evaluate_detector(
    detector: &str,
    variants: &[VariantIndices],
    detections: &DetectionStore,
    weights: UnderstandingWeights,
) -> DetectorReport {
    let mut samples = Vec::new();
    let mut skipped = Vec::new();
    let mut per_variant: BTreeMap<Variant, VariantMetrics> = BTreeMap::new();
    let mut samples_evaluated = BTreeMap::new();

    for group in variants {
        let mut scored = Vec::with_capacity(group.indices.len());
        for index in &group.indices {
            match detections.load(detector, group.variant, index.sample_id()) {
                Ok(detection) => scored.push(scoring::analyze_sample(index, detector, &detection)),
                Err(e) => {
                    warn!(
                        detector,
                        variant = %group.variant,
                        sample = index.sample_id(),
                        error = %e,
                        "skipping sample"
                    );
                    skipped.push(SkippedSample::new(
                        Some(detector),
                        group.variant,
                        index.sample_id(),
                        &e,
                    ));
                }
            }
        }
        per_variant.insert(group.variant, VariantMetrics::from_samples(&scored));
        samples_evaluated.insert(group.variant, scored.len());
        samples.extend(scored);
    }

    let metrics = |v: Variant| per_variant.get(&v).copied().unwrap_or_default();
    let analysis = CrossVariantAnalysis::new(
        detector,
        metrics(Variant::Ms),
        metrics(Variant::Tr),
        metrics(Variant::Df),
    )
    .with_weights(weights);

    info!(
        detector,
        evaluated = samples.len(),
        skipped = skipped.len(),
        understanding = ?analysis.understanding_score(),
        contamination = ?analysis.contamination_index(),
        unmeasured = ?analysis.unmeasured(),
        "detector scored"
    );

    DetectorReport {
        detector: detector.to_string(),
        analysis,
        samples_evaluated,
        skipped,
        samples,
    }
}

/// Run the full evaluation described by `config`.
pub async fn run_batch(config: &Config) -> anyhow::Result<BatchReport> {
    config.validate()?;
    let corpus = Corpus::from_config(config);

    let detectors = if config.evaluation.detectors.is_empty() {
        corpus.detections.detectors()?
    } else {
        config.evaluation.detectors.clone()
    };
    if detectors.is_empty() {
        anyhow::bail!(
            "no detectors configured or found under {}",
            corpus.detections.root().display()
        );
    }
    info!(
        detectors = detectors.len(),
        variants = config.corpus.variants.len(),
        "batch: starting"
    );

    let (indices, annotation_skips) =
        corpus.load_indices(&config.corpus.variants, &config.corpus.samples)?;
    let indices = Arc::new(indices);

    let mut tasks = JoinSet::new();
    for detector in detectors {
        let indices = Arc::clone(&indices);
        let detections = corpus.detections.clone();
        let weights = config.weights;
        tasks.spawn_blocking(move || evaluate_detector(&detector, &indices, &detections, weights));
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined?);
    }
    reports.sort_by(|a, b| a.detector.cmp(&b.detector));

    let succeeded = reports.iter().map(|r| r.samples.len()).sum();
    let skipped_count = annotation_skips.len() * reports.len()
        + reports.iter().map(|r| r.skipped.len()).sum::<usize>();

    info!(succeeded, skipped = skipped_count, "batch: complete");

    Ok(BatchReport {
        generated_at: Utc::now(),
        variants: config.corpus.variants.clone(),
        succeeded,
        skipped_count,
        detectors: reports,
        annotation_skips,
    })
}

//! Per-variant averages and the cross-variant composite indices used to rank
//! detectors.

use crate::annotation::Variant;
use crate::error::{Error, Result};
use crate::scoring::SampleAnalysis;
use serde::{Deserialize, Serialize, Serializer};

/// Unweighted means of per-sample metrics for one detector on one variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VariantMetrics {
    pub sample_count: usize,
    pub root_cause_found_rate: f64,
    pub avg_root_cause_precision: f64,
    pub avg_root_cause_recall: f64,
    pub avg_decoy_trap_rate: f64,
    pub avg_benign_flag_rate: f64,
    pub avg_precision: f64,
    pub verdict_vulnerable_rate: f64,
}

impl VariantMetrics {
    /// Averages over `samples`. An empty slice yields all zeros with
    /// `sample_count == 0`, which [`CrossVariantAnalysis`] treats as missing.
    pub fn from_samples(samples: &[SampleAnalysis]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        Self {
            sample_count: samples.len(),
            root_cause_found_rate: mean(samples, |s| indicator(s.root_cause_found())),
            avg_root_cause_precision: mean(samples, SampleAnalysis::root_cause_precision),
            avg_root_cause_recall: mean(samples, SampleAnalysis::root_cause_recall),
            avg_decoy_trap_rate: mean(samples, SampleAnalysis::decoy_trap_rate),
            avg_benign_flag_rate: mean(samples, SampleAnalysis::benign_flag_rate),
            avg_precision: mean(samples, SampleAnalysis::precision),
            verdict_vulnerable_rate: mean(samples, |s| indicator(s.verdict_vulnerable)),
        }
    }

    /// No sample was scored; the rates are placeholders, not measurements.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

fn mean(samples: &[SampleAnalysis], metric: impl Fn(&SampleAnalysis) -> f64) -> f64 {
    samples.iter().map(metric).sum::<f64>() / samples.len() as f64
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Policy weights for `understanding_score`. These are a chosen ranking
/// policy, not derived constants; they must be non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnderstandingWeights {
    #[serde(default = "default_tr_detection")]
    pub tr_detection: f64,
    #[serde(default = "default_decoy_resistance")]
    pub decoy_resistance: f64,
    #[serde(default = "default_fix_recognition")]
    pub fix_recognition: f64,
}

fn default_tr_detection() -> f64 {
    0.4
}
fn default_decoy_resistance() -> f64 {
    0.3
}
fn default_fix_recognition() -> f64 {
    0.3
}

impl Default for UnderstandingWeights {
    fn default() -> Self {
        Self {
            tr_detection: default_tr_detection(),
            decoy_resistance: default_decoy_resistance(),
            fix_recognition: default_fix_recognition(),
        }
    }
}

impl UnderstandingWeights {
    const SUM_TOLERANCE: f64 = 1e-9;

    pub fn sum(&self) -> f64 {
        self.tr_detection + self.decoy_resistance + self.fix_recognition
    }

    pub fn validate(&self) -> Result<()> {
        let all = [self.tr_detection, self.decoy_resistance, self.fix_recognition];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::config(format!(
                "understanding weights must be finite and non-negative, got {all:?}"
            )));
        }
        if (self.sum() - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(Error::config(format!(
                "understanding weights must sum to 1.0, got {}",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// One detector's metrics on all three variants. The composite indices are
/// methods, recomputed from the three metric sets on every call, and are
/// `None` when a variant they depend on has no scored sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossVariantAnalysis {
    pub detector: String,
    pub ms_metrics: VariantMetrics,
    pub tr_metrics: VariantMetrics,
    pub df_metrics: VariantMetrics,
    pub weights: UnderstandingWeights,
}

impl CrossVariantAnalysis {
    pub fn new(
        detector: impl Into<String>,
        ms_metrics: VariantMetrics,
        tr_metrics: VariantMetrics,
        df_metrics: VariantMetrics,
    ) -> Self {
        Self {
            detector: detector.into(),
            ms_metrics,
            tr_metrics,
            df_metrics,
            weights: UnderstandingWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: UnderstandingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn metrics(&self, variant: Variant) -> &VariantMetrics {
        match variant {
            Variant::Ms => &self.ms_metrics,
            Variant::Tr => &self.tr_metrics,
            Variant::Df => &self.df_metrics,
        }
    }

    /// Metrics for `variant`, or `None` when no sample of it was scored.
    /// Composites that need an unmeasured variant are `None` as well.
    pub fn measured(&self, variant: Variant) -> Option<&VariantMetrics> {
        let metrics = self.metrics(variant);
        (!metrics.is_empty()).then_some(metrics)
    }

    /// Variants with no scored sample.
    pub fn unmeasured(&self) -> Vec<Variant> {
        Variant::ALL
            .into_iter()
            .filter(|v| self.measured(*v).is_none())
            .collect()
    }

    /// Relative drop in root-cause detection from `ms` to `tr`. Negative when
    /// the detector does better on the trojan variant.
    pub fn contamination_index(&self) -> Option<f64> {
        let ms = self.measured(Variant::Ms)?.root_cause_found_rate;
        let tr = self.measured(Variant::Tr)?.root_cause_found_rate;
        Some(if ms > 0.0 { (ms - tr) / ms } else { 0.0 })
    }

    pub fn decoy_resistance(&self) -> Option<f64> {
        Some(1.0 - self.measured(Variant::Tr)?.avg_decoy_trap_rate)
    }

    /// On patched code, not re-flagging the old root cause counts as
    /// recognising the fix.
    pub fn fix_recognition_rate(&self) -> Option<f64> {
        Some(1.0 - self.measured(Variant::Df)?.root_cause_found_rate)
    }

    pub fn understanding_score(&self) -> Option<f64> {
        let w = &self.weights;
        let tr = self.measured(Variant::Tr)?;
        Some(
            w.tr_detection * tr.root_cause_found_rate
                + w.decoy_resistance * self.decoy_resistance()?
                + w.fix_recognition * self.fix_recognition_rate()?,
        )
    }

    pub fn pattern_matching_index(&self) -> Option<f64> {
        let tr = self.measured(Variant::Tr)?;
        let ms = self.measured(Variant::Ms)?;
        Some((tr.avg_decoy_trap_rate + ms.avg_benign_flag_rate) / 2.0)
    }
}

#[derive(Serialize)]
struct CrossVariantRecord<'a> {
    detector: &'a str,
    ms_metrics: &'a VariantMetrics,
    tr_metrics: &'a VariantMetrics,
    df_metrics: &'a VariantMetrics,
    weights: &'a UnderstandingWeights,
    unmeasured_variants: Vec<Variant>,
    contamination_index: Option<f64>,
    decoy_resistance: Option<f64>,
    fix_recognition_rate: Option<f64>,
    understanding_score: Option<f64>,
    pattern_matching_index: Option<f64>,
}

impl Serialize for CrossVariantAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CrossVariantRecord {
            detector: &self.detector,
            ms_metrics: &self.ms_metrics,
            tr_metrics: &self.tr_metrics,
            df_metrics: &self.df_metrics,
            weights: &self.weights,
            unmeasured_variants: self.unmeasured(),
            contamination_index: self.contamination_index(),
            decoy_resistance: self.decoy_resistance(),
            fix_recognition_rate: self.fix_recognition_rate(),
            understanding_score: self.understanding_score(),
            pattern_matching_index: self.pattern_matching_index(),
        }
        .serialize(serializer)
    }
}

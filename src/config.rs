use crate::aggregate::UnderstandingWeights;
use crate::annotation::Variant;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub weights: UnderstandingWeights,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where annotations and detections live, and which samples to score.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_annotations_dir")]
    pub annotations_dir: PathBuf,
    #[serde(default = "default_detections_dir")]
    pub detections_dir: PathBuf,
    #[serde(default = "default_variants")]
    pub variants: Vec<Variant>,
    /// Restrict the run to these sample ids. Empty means every annotated sample.
    #[serde(default)]
    pub samples: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            annotations_dir: default_annotations_dir(),
            detections_dir: default_detections_dir(),
            variants: default_variants(),
            samples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EvaluationConfig {
    /// Detectors to score. Empty means every subdirectory of `detections_dir`.
    #[serde(default)]
    pub detectors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_samples: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_samples: true,
        }
    }
}

// Defaults
fn default_annotations_dir() -> PathBuf {
    PathBuf::from("data/annotations")
}
fn default_detections_dir() -> PathBuf {
    PathBuf::from("data/detections")
}
fn default_variants() -> Vec<Variant> {
    Variant::ALL.to_vec()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("results/codeact")
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.corpus.variants.is_empty() {
            return Err(Error::config("corpus.variants must name at least one variant"));
        }
        for name in &self.evaluation.detectors {
            check_path_component("evaluation.detectors", name)?;
        }
        for id in &self.corpus.samples {
            check_path_component("corpus.samples", id)?;
        }
        self.weights.validate()
    }
}

/// Detector names and sample ids become single path components under the
/// corpus and output directories.
fn check_path_component(field: &str, name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name.contains("..") || name.contains(['/', '\\']) {
        return Err(Error::config(format!(
            "{field}: {name:?} must be a plain name without path separators or '..'"
        )));
    }
    Ok(())
}

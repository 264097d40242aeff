use crate::annotation::{LineRef, Variant};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// One detector's raw answer for one sample.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub prediction: Prediction,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub vulnerabilities: Vec<ReportedFinding>,
}

/// Detectors answer either with a boolean or a label such as `"vulnerable"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Verdict {
    Flag(bool),
    Label(String),
}

impl Verdict {
    pub fn says_vulnerable(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Label(label) => matches!(
                label.trim().to_ascii_lowercase().as_str(),
                "vulnerable" | "yes" | "true" | "unsafe"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportedFinding {
    #[serde(default)]
    pub vulnerable_lines: Option<Vec<LineRef>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "type")]
    pub vulnerability_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

impl Detection {
    pub fn from_json(detector: &str, sample_id: &str, content: &str) -> Result<Self> {
        let detection: Detection = serde_json::from_str(content)
            .map_err(|e| Error::detection_parse(detector, sample_id, e.to_string()))?;
        if let Some(declared) = &detection.sample_id
            && declared != sample_id
        {
            warn!(
                detector,
                expected = sample_id,
                declared = %declared,
                "detection file declares a different sample id"
            );
        }
        Ok(detection)
    }

    pub fn says_vulnerable(&self) -> bool {
        self.prediction
            .verdict
            .as_ref()
            .is_some_and(Verdict::says_vulnerable)
    }
}

/// Detection files laid out as `<root>/<detector>/<sample_id>.json`, or
/// `<root>/<detector>/<variant>/<sample_id>.json` when a corpus reuses sample
/// ids across variants. The per-variant path is tried first.
#[derive(Debug, Clone)]
pub struct DetectionStore {
    root: PathBuf,
}

impl DetectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, detector: &str, sample_id: &str) -> PathBuf {
        self.root.join(detector).join(format!("{sample_id}.json"))
    }

    pub fn variant_path(&self, detector: &str, variant: Variant, sample_id: &str) -> PathBuf {
        self.root
            .join(detector)
            .join(variant.as_str())
            .join(format!("{sample_id}.json"))
    }

    pub fn load(&self, detector: &str, variant: Variant, sample_id: &str) -> Result<Detection> {
        let nested = self.variant_path(detector, variant, sample_id);
        let path = if nested.is_file() {
            nested
        } else {
            self.path(detector, sample_id)
        };
        if !path.is_file() {
            return Err(Error::DetectionNotFound {
                detector: detector.to_string(),
                sample_id: sample_id.to_string(),
                path,
            });
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::detection_parse(detector, sample_id, e.to_string()))?;
        Detection::from_json(detector, sample_id, &content)
    }

    /// Detector names, taken from the subdirectories of the store root.
    pub fn detectors(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(Error::config(format!(
                "detections directory {} does not exist",
                self.root.display()
            )));
        }
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }
}

use crate::annotation::Variant;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("annotation not found for {variant}/{sample_id} in {}", dir.display())]
    AnnotationNotFound {
        variant: Variant,
        sample_id: String,
        dir: PathBuf,
    },

    #[error("annotation parse error ({}): {message}", path.display())]
    AnnotationParse { path: PathBuf, message: String },

    #[error("detection not found for {detector}/{sample_id} at {}", path.display())]
    DetectionNotFound {
        detector: String,
        sample_id: String,
        path: PathBuf,
    },

    #[error("detection parse error ({detector}/{sample_id}): {message}")]
    DetectionParse {
        detector: String,
        sample_id: String,
        message: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn annotation_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::AnnotationParse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn detection_parse(
        detector: impl Into<String>,
        sample_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DetectionParse {
            detector: detector.into(),
            sample_id: sample_id.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable tag recorded alongside skipped samples.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AnnotationNotFound { .. } => "annotation_not_found",
            Self::AnnotationParse { .. } => "annotation_parse",
            Self::DetectionNotFound { .. } => "detection_not_found",
            Self::DetectionParse { .. } => "detection_parse",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

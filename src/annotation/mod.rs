//! Ground-truth annotations: which source lines carry which security role.
//!
//! Each corpus variant ships its own annotation shape (see [`ms`], [`tr`],
//! [`df`]). All three reduce to the same [`LineIndex`], a line-number to
//! [`CodeAct`] map built once per `(variant, sample_id)` pair.

pub mod df;
pub mod ms;
pub mod tr;

pub use df::DfAnnotation;
pub use ms::MsAnnotation;
pub use tr::TrAnnotation;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Corpus transformation a sample belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Minimal-sanitized: full CodeAct listing, documentation hints kept.
    Ms,
    /// Trojan: base vulnerability plus injected decoys.
    Tr,
    /// Differential: the vulnerability has been patched.
    Df,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Ms, Variant::Tr, Variant::Df];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ms => "ms",
            Self::Tr => "tr",
            Self::Df => "df",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityFunction {
    #[serde(alias = "TARGET")]
    RootCause,
    SecondaryVuln,
    Prereq,
    Benign,
    Decoy,
    #[serde(other)]
    Unrelated,
}

impl SecurityFunction {
    pub const ALL: [SecurityFunction; 6] = [
        SecurityFunction::RootCause,
        SecurityFunction::SecondaryVuln,
        SecurityFunction::Prereq,
        SecurityFunction::Benign,
        SecurityFunction::Decoy,
        SecurityFunction::Unrelated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RootCause => "ROOT_CAUSE",
            Self::SecondaryVuln => "SECONDARY_VULN",
            Self::Prereq => "PREREQ",
            Self::Benign => "BENIGN",
            Self::Decoy => "DECOY",
            Self::Unrelated => "UNRELATED",
        }
    }
}

impl std::fmt::Display for SecurityFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line number as written by corpus authors or detectors: either an
/// integer or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(untagged)]
pub enum LineRef {
    Number(i64),
    Text(String),
}

impl LineRef {
    pub fn as_line(&self) -> Option<u32> {
        match self {
            Self::Number(n) => u32::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Resolve a `lines` list plus an optional single `line` into line numbers.
/// Entries that are not numbers are dropped.
pub(crate) fn collect_lines(lines: &[LineRef], line: Option<&LineRef>) -> Vec<u32> {
    lines
        .iter()
        .chain(line)
        .filter_map(|r| {
            let parsed = r.as_line();
            if parsed.is_none() {
                debug!(line = ?r, "ignoring non-numeric line reference");
            }
            parsed
        })
        .collect()
}

/// Optional note describing how a code-act's role changed between variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Transition {
    Note(String),
    Change {
        #[serde(default)]
        from: Option<SecurityFunction>,
        #[serde(default)]
        to: Option<SecurityFunction>,
        #[serde(default)]
        note: Option<String>,
    },
}

impl Transition {
    pub fn describe(&self) -> String {
        match self {
            Self::Note(note) => note.clone(),
            Self::Change { from, to, note } => {
                let arrow = match (from, to) {
                    (Some(f), Some(t)) => format!("{f} -> {t}"),
                    (Some(f), None) => format!("{f} -> ?"),
                    (None, Some(t)) => format!("? -> {t}"),
                    (None, None) => String::new(),
                };
                match note {
                    Some(n) if arrow.is_empty() => n.clone(),
                    Some(n) => format!("{arrow} ({n})"),
                    None => arrow,
                }
            }
        }
    }
}

/// Declared code-act as it appears in `ms` and `df` annotation files.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeActRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub act_type: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineRef>,
    #[serde(default)]
    pub line: Option<LineRef>,
    #[serde(default)]
    pub security_function: Option<SecurityFunction>,
    #[serde(default)]
    pub rationale: Option<String>,
    /// Post-patch description, present in `df` annotations.
    #[serde(default)]
    pub fixed: Option<df::FixedRecord>,
    #[serde(default)]
    pub transition: Option<Transition>,
}

impl CodeActRecord {
    pub fn claimed_lines(&self) -> Vec<u32> {
        collect_lines(&self.lines, self.line.as_ref())
    }

    pub(crate) fn type_or_unknown(&self) -> String {
        self.act_type.clone().unwrap_or_else(|| UNKNOWN_TYPE.into())
    }
}

pub(crate) const UNKNOWN_TYPE: &str = "unknown";

/// A resolved code-act occupying one or more lines of a sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeAct {
    pub id: String,
    #[serde(rename = "type")]
    pub act_type: String,
    pub security_function: SecurityFunction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

/// Outcome of looking up one flagged line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeActMatch {
    pub line: u32,
    pub code_act_id: String,
    pub code_act_type: String,
    pub security_function: SecurityFunction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Two code-acts claimed the same line; the later one was kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCollision {
    pub line: u32,
    pub replaced: String,
    pub kept: String,
}

/// Count of annotated lines per role, independent of any detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroundTruthTotals {
    pub total_root_causes: usize,
    pub total_decoys: usize,
    pub total_secondary_vulns: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineIndex {
    variant: Variant,
    sample_id: String,
    entries: BTreeMap<u32, CodeAct>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    collisions: Vec<LineCollision>,
}

impl LineIndex {
    pub fn new(variant: Variant, sample_id: impl Into<String>) -> Self {
        Self {
            variant,
            sample_id: sample_id.into(),
            entries: BTreeMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Assign `line` to `act`. A line already held by a different code-act is
    /// overwritten (last write wins) and recorded as a collision.
    pub fn claim(&mut self, line: u32, act: CodeAct) {
        let kept = act.id.clone();
        if let Some(previous) = self.entries.insert(line, act)
            && previous.id != kept
        {
            warn!(
                variant = %self.variant,
                sample = %self.sample_id,
                line,
                replaced = %previous.id,
                kept = %kept,
                "line collision in annotation"
            );
            self.collisions.push(LineCollision {
                line,
                replaced: previous.id,
                kept,
            });
        }
    }

    pub fn get(&self, line: u32) -> Option<&CodeAct> {
        self.entries.get(&line)
    }

    pub fn lookup(&self, line: u32) -> Option<CodeActMatch> {
        self.entries.get(&line).map(|act| CodeActMatch {
            line,
            code_act_id: act.id.clone(),
            code_act_type: act.act_type.clone(),
            security_function: act.security_function,
            rationale: act.rationale.clone(),
        })
    }

    pub fn lines_with_function(&self, function: SecurityFunction) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|(_, act)| act.security_function == function)
            .map(|(line, _)| *line)
            .collect()
    }

    pub fn ground_truth(&self) -> GroundTruthTotals {
        let count = |f: SecurityFunction| {
            self.entries
                .values()
                .filter(|act| act.security_function == f)
                .count()
        };
        GroundTruthTotals {
            total_root_causes: count(SecurityFunction::RootCause),
            total_decoys: count(SecurityFunction::Decoy),
            total_secondary_vulns: count(SecurityFunction::SecondaryVuln),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &CodeAct)> {
        self.entries.iter().map(|(line, act)| (*line, act))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn collisions(&self) -> &[LineCollision] {
        &self.collisions
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }
}

/// Shared build contract for the per-variant annotation shapes.
pub trait IndexSource {
    fn build_index(&self, sample_id: &str) -> LineIndex;
}

/// A parsed annotation file, tagged by corpus variant.
#[derive(Debug, Clone)]
pub enum Annotation {
    Ms(MsAnnotation),
    Tr(TrAnnotation),
    Df(DfAnnotation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationFormat {
    Yaml,
    Json,
}

impl AnnotationFormat {
    const EXTENSIONS: [(&'static str, AnnotationFormat); 3] = [
        ("yaml", AnnotationFormat::Yaml),
        ("yml", AnnotationFormat::Yaml),
        ("json", AnnotationFormat::Json),
    ];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::EXTENSIONS
            .iter()
            .find(|(e, _)| ext.eq_ignore_ascii_case(e))
            .map(|(_, format)| *format)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    content: &str,
    format: AnnotationFormat,
    path: &Path,
) -> Result<T> {
    match format {
        AnnotationFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| Error::annotation_parse(path, e.to_string()))
        }
        AnnotationFormat::Json => {
            serde_json::from_str(content).map_err(|e| Error::annotation_parse(path, e.to_string()))
        }
    }
}

impl Annotation {
    /// Decode annotation text into the shape for `variant`. `path` is only
    /// used for error messages.
    pub fn parse(
        variant: Variant,
        content: &str,
        format: AnnotationFormat,
        path: &Path,
    ) -> Result<Self> {
        Ok(match variant {
            Variant::Ms => Self::Ms(decode(content, format, path)?),
            Variant::Tr => Self::Tr(decode(content, format, path)?),
            Variant::Df => Self::Df(decode(content, format, path)?),
        })
    }

    pub fn variant(&self) -> Variant {
        match self {
            Self::Ms(_) => Variant::Ms,
            Self::Tr(_) => Variant::Tr,
            Self::Df(_) => Variant::Df,
        }
    }
}

impl IndexSource for Annotation {
    fn build_index(&self, sample_id: &str) -> LineIndex {
        match self {
            Self::Ms(a) => a.build_index(sample_id),
            Self::Tr(a) => a.build_index(sample_id),
            Self::Df(a) => a.build_index(sample_id),
        }
    }
}

/// Annotation files laid out as `<root>/<variant>/<sample_id>.{yaml,yml,json}`.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    root: PathBuf,
}

impl AnnotationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn variant_dir(&self, variant: Variant) -> PathBuf {
        self.root.join(variant.as_str())
    }

    /// Find the annotation file for a sample, trying each known extension.
    pub fn locate(&self, variant: Variant, sample_id: &str) -> Result<(PathBuf, AnnotationFormat)> {
        let dir = self.variant_dir(variant);
        AnnotationFormat::EXTENSIONS
            .iter()
            .map(|(ext, format)| (dir.join(format!("{sample_id}.{ext}")), *format))
            .find(|(path, _)| path.is_file())
            .ok_or_else(|| Error::AnnotationNotFound {
                variant,
                sample_id: sample_id.to_string(),
                dir,
            })
    }

    pub fn load_annotation(&self, variant: Variant, sample_id: &str) -> Result<Annotation> {
        let (path, format) = self.locate(variant, sample_id)?;
        let content = std::fs::read_to_string(&path)?;
        Annotation::parse(variant, &content, format, &path)
    }

    pub fn load(&self, variant: Variant, sample_id: &str) -> Result<LineIndex> {
        let annotation = self.load_annotation(variant, sample_id)?;
        let index = annotation.build_index(sample_id);
        debug!(
            variant = %variant,
            sample = sample_id,
            lines = index.len(),
            collisions = index.collisions().len(),
            "annotation index built"
        );
        Ok(index)
    }

    /// Sample ids with an annotation file for `variant`, sorted. A missing
    /// variant directory yields no samples.
    pub fn sample_ids(&self, variant: Variant) -> Result<Vec<String>> {
        let dir = self.variant_dir(variant);
        if !dir.is_dir() {
            warn!(variant = %variant, dir = %dir.display(), "annotation directory missing");
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| AnnotationFormat::from_path(e.path()).is_some())
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

//! Trojan annotations: the untouched base vulnerability plus injected decoys.
//!
//! The index is built in two layers. Base-vulnerability lines are claimed
//! first as `ROOT_CAUSE` under the id [`BASE_VULN_ID`]; injections are applied
//! afterwards in file order, so an injection sharing a line with the base
//! vulnerability (or an earlier injection) replaces it. Decoys are placed next
//! to the real vulnerable code on purpose, and a flagged shared line is scored
//! as falling for the decoy.

use super::{CodeAct, IndexSource, LineIndex, LineRef, SecurityFunction, UNKNOWN_TYPE, Variant};
use serde::Deserialize;

pub const BASE_VULN_ID: &str = "BASE_VULN";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrAnnotation {
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub base_vulnerability: Option<BaseVulnerability>,
    #[serde(default)]
    pub injections: Vec<Injection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseVulnerability {
    #[serde(rename = "type", default)]
    pub vuln_type: Option<String>,
    #[serde(default)]
    pub vulnerable_lines: Vec<LineRef>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Injection {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub injection_type: Option<String>,
    #[serde(default)]
    pub location: InjectionLocation,
    #[serde(default)]
    pub security_function: Option<SecurityFunction>,
    #[serde(default)]
    pub safe_because: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InjectionLocation {
    #[serde(default)]
    pub lines: Vec<LineRef>,
    #[serde(default)]
    pub line: Option<LineRef>,
}

impl Injection {
    fn to_code_act(&self, ordinal: usize) -> CodeAct {
        let rationale = if self.safe_because.is_empty() {
            None
        } else {
            Some(self.safe_because.join("; "))
        };
        CodeAct {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| format!("INJECTION_{ordinal}")),
            act_type: self
                .injection_type
                .clone()
                .unwrap_or_else(|| UNKNOWN_TYPE.into()),
            security_function: self.security_function.unwrap_or(SecurityFunction::Decoy),
            rationale,
            transition: None,
        }
    }
}

impl IndexSource for TrAnnotation {
    fn build_index(&self, sample_id: &str) -> LineIndex {
        let mut index = LineIndex::new(Variant::Tr, sample_id);

        if let Some(base) = &self.base_vulnerability {
            let act = CodeAct {
                id: BASE_VULN_ID.into(),
                act_type: base
                    .vuln_type
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_TYPE.into()),
                security_function: SecurityFunction::RootCause,
                rationale: base.description.clone(),
                transition: None,
            };
            for line in super::collect_lines(&base.vulnerable_lines, None) {
                index.claim(line, act.clone());
            }
        }

        for (i, injection) in self.injections.iter().enumerate() {
            let act = injection.to_code_act(i + 1);
            let lines =
                super::collect_lines(&injection.location.lines, injection.location.line.as_ref());
            for line in lines {
                index.claim(line, act.clone());
            }
        }

        index
    }
}

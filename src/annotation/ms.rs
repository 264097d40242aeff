//! Minimal-sanitized annotations.
//!
//! Two shapes are accepted. Newer files carry an explicit `line_to_code_act`
//! map joined against `code_act_security_functions` and the declared
//! `code_acts`; older files only declare `code_acts`, each claiming its own
//! `line`/`lines`.

use super::{
    CodeAct, CodeActRecord, IndexSource, LineIndex, LineRef, SecurityFunction, UNKNOWN_TYPE,
    Variant,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MsAnnotation {
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub line_to_code_act: BTreeMap<LineRef, String>,
    #[serde(default, alias = "security_functions")]
    pub code_act_security_functions: BTreeMap<String, SecurityFunction>,
    #[serde(default)]
    pub code_acts: Vec<CodeActRecord>,
}

impl MsAnnotation {
    fn index_explicit_map(&self, index: &mut LineIndex) {
        let by_id: HashMap<&str, &CodeActRecord> =
            self.code_acts.iter().map(|r| (r.id.as_str(), r)).collect();

        for (line_ref, id) in &self.line_to_code_act {
            let Some(line) = line_ref.as_line() else {
                debug!(line = ?line_ref, code_act = %id, "skipping non-numeric map key");
                continue;
            };
            let record = by_id.get(id.as_str()).copied();
            let security_function = self
                .code_act_security_functions
                .get(id)
                .copied()
                .or_else(|| record.and_then(|r| r.security_function))
                .unwrap_or(SecurityFunction::Unrelated);

            index.claim(
                line,
                CodeAct {
                    id: id.clone(),
                    act_type: record
                        .map(CodeActRecord::type_or_unknown)
                        .unwrap_or_else(|| UNKNOWN_TYPE.into()),
                    security_function,
                    rationale: record.and_then(|r| r.rationale.clone()),
                    transition: None,
                },
            );
        }
    }

    fn index_declared_acts(&self, index: &mut LineIndex) {
        for record in &self.code_acts {
            let security_function = record
                .security_function
                .or_else(|| self.code_act_security_functions.get(&record.id).copied())
                .unwrap_or(SecurityFunction::Unrelated);
            let act = CodeAct {
                id: record.id.clone(),
                act_type: record.type_or_unknown(),
                security_function,
                rationale: record.rationale.clone(),
                transition: None,
            };
            for line in record.claimed_lines() {
                index.claim(line, act.clone());
            }
        }
    }
}

impl IndexSource for MsAnnotation {
    fn build_index(&self, sample_id: &str) -> LineIndex {
        let mut index = LineIndex::new(Variant::Ms, sample_id);
        if self.line_to_code_act.is_empty() {
            self.index_declared_acts(&mut index);
        } else {
            self.index_explicit_map(&mut index);
        }
        index
    }
}

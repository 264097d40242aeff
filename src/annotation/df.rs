//! Differential annotations: the patched program.
//!
//! Only the nested `fixed` record of each code-act counts. Its lines and role
//! describe the post-patch code; top-level `lines`/`security_function` refer
//! to the vulnerable original and are ignored here.

use super::{
    CodeAct, CodeActRecord, IndexSource, LineIndex, LineRef, SecurityFunction, Transition, Variant,
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DfAnnotation {
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub transition: Option<Transition>,
    #[serde(default)]
    pub code_acts: Vec<CodeActRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixedRecord {
    #[serde(rename = "type", default)]
    pub act_type: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineRef>,
    #[serde(default)]
    pub line: Option<LineRef>,
    /// Missing roles default to `BENIGN`: the patch removed the danger.
    #[serde(default)]
    pub security_function: Option<SecurityFunction>,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl IndexSource for DfAnnotation {
    fn build_index(&self, sample_id: &str) -> LineIndex {
        let mut index = LineIndex::new(Variant::Df, sample_id);

        for record in &self.code_acts {
            let Some(fixed) = &record.fixed else {
                debug!(sample = sample_id, code_act = %record.id, "no fixed record, skipping");
                continue;
            };
            let transition = record
                .transition
                .as_ref()
                .or(self.transition.as_ref())
                .map(Transition::describe);
            let act = CodeAct {
                id: record.id.clone(),
                act_type: fixed
                    .act_type
                    .clone()
                    .unwrap_or_else(|| record.type_or_unknown()),
                security_function: fixed.security_function.unwrap_or(SecurityFunction::Benign),
                rationale: fixed.rationale.clone(),
                transition,
            };
            for line in super::collect_lines(&fixed.lines, fixed.line.as_ref()) {
                index.claim(line, act.clone());
            }
        }

        index
    }
}

use serde::Serialize;

use crate::config::{RuleConfig, TerminalConfig};

/// Scoring constraints for one subject, derived from its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRule {
    pub is_drawing: bool,
    pub external_max: u32,
    pub internal_max: u32,
    pub internal_allowed: bool,
}

impl SubjectRule {
    /// Highest obtainable total for the subject.
    pub fn full_marks(&self) -> u32 {
        if self.internal_allowed {
            self.external_max + self.internal_max
        } else {
            self.external_max
        }
    }
}

pub fn is_drawing_subject(subject_name: Option<&str>, cfg: &RuleConfig) -> bool {
    subject_name
        .map(|s| s.trim().to_lowercase())
        .is_some_and(|s| s.contains(cfg.drawing_keyword.as_str()))
}

pub fn resolve_subject_rule(subject_name: Option<&str>, cfg: &RuleConfig) -> SubjectRule {
    if is_drawing_subject(subject_name, cfg) {
        SubjectRule {
            is_drawing: true,
            external_max: cfg.drawing_external_max,
            internal_max: cfg.internal_max,
            internal_allowed: false,
        }
    } else {
        SubjectRule {
            is_drawing: false,
            external_max: cfg.regular_external_max,
            internal_max: cfg.internal_max,
            internal_allowed: true,
        }
    }
}

/// Maps terminal input onto its canonical name via the alias table.
/// Unknown values pass through trimmed.
pub fn normalize_terminal(raw: &str, cfg: &TerminalConfig) -> String {
    let trimmed = raw.trim();
    match cfg.aliases.get(&trimmed.to_lowercase()) {
        Some(canonical) => canonical.clone(),
        None => trimmed.to_string(),
    }
}

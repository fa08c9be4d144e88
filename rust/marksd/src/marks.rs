//! Mark entry form state and the pure validation pipeline behind it.
//!
//! Every edit goes through [`reduce`], which never mutates its input: it
//! returns the next form together with what happened to the edited field.
//! Submission goes through [`build_payload`], which re-checks the whole mark
//! set before producing the wire payload.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::backend::SubjectDescriptor;
use crate::config::{EngineConfig, RuleConfig};
use crate::error::{MarksError, Result};
use crate::rules::{normalize_terminal, resolve_subject_rule, SubjectRule};

pub const MSG_INTERNAL_NOT_ALLOWED: &str = "internal marks not allowed for this subject";
pub const MSG_INTERNAL_NOT_ALLOWED_DRAWING: &str = "internal marks not allowed for Drawing subject";
pub const MSG_MIN_MARKS: &str = "minimum marks must be 0";
pub const MSG_NO_MARKS: &str = "enter at least one mark";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkField {
    ExternalMarks,
    InternalMarks,
}

impl MarkField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "external_marks" => Some(Self::ExternalMarks),
            "internal_marks" => Some(Self::InternalMarks),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExternalMarks => "external_marks",
            Self::InternalMarks => "internal_marks",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ExternalMarks => "external",
            Self::InternalMarks => "internal",
        }
    }

    fn cap(self, rule: &SubjectRule) -> u32 {
        match self {
            Self::ExternalMarks => rule.external_max,
            Self::InternalMarks => rule.internal_max,
        }
    }
}

/// Position of one input box: entry index plus field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    pub index: usize,
    pub field: MarkField,
}

impl FieldKey {
    pub fn new(index: usize, field: MarkField) -> Self {
        Self { index, field }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.index, self.field.as_str())
    }
}

/// Field-scoped messages, ordered by entry index then field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorMap(BTreeMap<FieldKey, String>);

impl ErrorMap {
    pub fn insert(&mut self, key: FieldKey, message: impl Into<String>) {
        self.0.insert(key, message.into());
    }

    pub fn clear(&mut self, key: &FieldKey) {
        self.0.remove(key);
    }

    #[cfg(test)]
    pub fn get(&self, key: &FieldKey) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }
}

impl Serialize for ErrorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(&k.to_string(), v)?;
        }
        map.end()
    }
}

/// One subject row; `None` is an empty input box.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    pub external_marks: Option<f64>,
    pub internal_marks: Option<f64>,
}

impl MarkEntry {
    pub fn for_subject(name: impl Into<String>) -> Self {
        Self {
            subject_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn value(&self, field: MarkField) -> Option<f64> {
        match field {
            MarkField::ExternalMarks => self.external_marks,
            MarkField::InternalMarks => self.internal_marks,
        }
    }

    fn slot_mut(&mut self, field: MarkField) -> &mut Option<f64> {
        match field {
            MarkField::ExternalMarks => &mut self.external_marks,
            MarkField::InternalMarks => &mut self.internal_marks,
        }
    }

    pub fn rule(&self, cfg: &RuleConfig) -> SubjectRule {
        resolve_subject_rule(self.subject_name.as_deref(), cfg)
    }
}

/// Raw selections as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormHeader {
    pub class: String,
    pub section: String,
    pub terminal: String,
    pub roll_no: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeaderPatch {
    pub class: Option<String>,
    pub section: Option<String>,
    pub terminal: Option<String>,
    pub roll_no: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkForm {
    pub header: FormHeader,
    pub entries: Vec<MarkEntry>,
    pub errors: ErrorMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    LoadSubjects(Vec<SubjectDescriptor>),
    SetHeader(HeaderPatch),
    SetField {
        index: usize,
        field: MarkField,
        raw: String,
    },
}

/// What a single field edit did.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Accepted(f64),
    Cleared,
    Rejected(String),
    /// Non-numeric input; the form is left untouched.
    Ignored,
}

impl FieldOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Accepted(_) | Self::Cleared)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub form: MarkForm,
    pub field: Option<FieldOutcome>,
}

fn parse_mark(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Checks a candidate value for one field of `entry` without touching any state.
pub fn check_field(
    entry: &MarkEntry,
    field: MarkField,
    raw: &str,
    cfg: &RuleConfig,
) -> FieldOutcome {
    let rule = entry.rule(cfg);
    if field == MarkField::InternalMarks && !rule.internal_allowed {
        return FieldOutcome::Rejected(MSG_INTERNAL_NOT_ALLOWED.to_string());
    }

    let raw = raw.trim();
    if raw.is_empty() {
        return FieldOutcome::Cleared;
    }
    let Some(v) = parse_mark(raw) else {
        return FieldOutcome::Ignored;
    };
    if v < 0.0 {
        return FieldOutcome::Rejected(MSG_MIN_MARKS.to_string());
    }
    let max = field.cap(&rule);
    if v > f64::from(max) {
        return FieldOutcome::Rejected(format!(
            "{} marks must not exceed {}",
            field.label(),
            max
        ));
    }
    FieldOutcome::Accepted(v)
}

pub fn reduce(form: &MarkForm, action: FormAction, cfg: &EngineConfig) -> Result<Transition> {
    let mut next = form.clone();
    match action {
        FormAction::LoadSubjects(subjects) => {
            next.entries = subjects
                .into_iter()
                .map(|s| MarkEntry::for_subject(s.name))
                .collect();
            next.errors = ErrorMap::default();
            Ok(Transition {
                form: next,
                field: None,
            })
        }
        FormAction::SetHeader(patch) => {
            let h = &mut next.header;
            if let Some(v) = patch.class {
                h.class = v;
            }
            if let Some(v) = patch.section {
                h.section = v;
            }
            if let Some(v) = patch.terminal {
                h.terminal = v;
            }
            if let Some(v) = patch.roll_no {
                h.roll_no = v;
            }
            Ok(Transition {
                form: next,
                field: None,
            })
        }
        FormAction::SetField { index, field, raw } => {
            let len = next.entries.len();
            let Some(entry) = next.entries.get_mut(index) else {
                return Err(MarksError::EntryOutOfRange { index, len });
            };
            let key = FieldKey::new(index, field);
            let outcome = check_field(entry, field, &raw, &cfg.rules);
            match &outcome {
                FieldOutcome::Accepted(v) => {
                    *entry.slot_mut(field) = Some(*v);
                    next.errors.clear(&key);
                }
                FieldOutcome::Cleared => {
                    *entry.slot_mut(field) = None;
                    next.errors.clear(&key);
                }
                FieldOutcome::Rejected(message) => {
                    next.errors.insert(key, message.clone());
                }
                FieldOutcome::Ignored => {}
            }
            Ok(Transition {
                form: next,
                field: Some(outcome),
            })
        }
    }
}

/// Re-checks every entry against its subject's caps.
pub fn validate_entries(entries: &[MarkEntry], cfg: &RuleConfig) -> ErrorMap {
    let mut errors = ErrorMap::default();
    for (index, entry) in entries.iter().enumerate() {
        let rule = entry.rule(cfg);

        if let Some(v) = entry.external_marks {
            if !(0.0..=f64::from(rule.external_max)).contains(&v) {
                let message = if v < 0.0 {
                    MSG_MIN_MARKS.to_string()
                } else {
                    format!("external marks must not exceed {}", rule.external_max)
                };
                errors.insert(FieldKey::new(index, MarkField::ExternalMarks), message);
            }
        }

        let internal_key = FieldKey::new(index, MarkField::InternalMarks);
        match entry.internal_marks {
            Some(v) if rule.internal_allowed => {
                if v < 0.0 {
                    errors.insert(internal_key, MSG_MIN_MARKS);
                } else if v > f64::from(rule.internal_max) {
                    errors.insert(
                        internal_key,
                        format!("internal marks must not exceed {}", rule.internal_max),
                    );
                }
            }
            Some(v) if v > 0.0 => {
                errors.insert(internal_key, MSG_INTERNAL_NOT_ALLOWED_DRAWING);
            }
            _ => {}
        }
    }
    errors
}

/// Whole marks go out as JSON integers; fractional marks stay floats.
fn serialize_mark<S: Serializer>(v: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if v.fract() == 0.0 && v.abs() <= 9_007_199_254_740_992.0 {
        serializer.serialize_i64(*v as i64)
    } else {
        serializer.serialize_f64(*v)
    }
}

fn serialize_opt_mark<S: Serializer>(
    v: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match v {
        Some(v) => serialize_mark(v, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectMarks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(serialize_with = "serialize_mark")]
    pub external_marks: f64,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_mark"
    )]
    pub internal_marks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionPayload {
    pub class: String,
    pub section: String,
    pub terminal: String,
    pub roll_no: u32,
    pub marks: Vec<SubjectMarks>,
}

/// Converts entries into wire marks, dropping rows where nothing was scored.
pub fn collect_marks(entries: &[MarkEntry], cfg: &RuleConfig) -> Result<Vec<SubjectMarks>> {
    let marks: Vec<SubjectMarks> = entries
        .iter()
        .map(|entry| {
            let rule = entry.rule(cfg);
            SubjectMarks {
                subject_name: entry.subject_name.clone(),
                external_marks: entry.external_marks.unwrap_or(0.0),
                internal_marks: rule
                    .internal_allowed
                    .then(|| entry.internal_marks.unwrap_or(0.0)),
            }
        })
        .filter(|m| m.external_marks != 0.0 || m.internal_marks.unwrap_or(0.0) != 0.0)
        .collect();

    if marks.is_empty() {
        return Err(MarksError::incomplete(MSG_NO_MARKS));
    }
    Ok(marks)
}

fn required(value: &str, what: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(MarksError::incomplete(format!("{} is required", what)));
    }
    Ok(v.to_string())
}

pub fn parse_roll_no(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(MarksError::incomplete(
            "roll number must be a whole number of at least 1",
        )),
    }
}

/// Header checks, then whole-form validation, then payload assembly.
pub fn build_payload(form: &MarkForm, cfg: &EngineConfig) -> Result<SubmissionPayload> {
    let class = required(&form.header.class, "class")?;
    let section = required(&form.header.section, "section")?;
    let terminal = required(&form.header.terminal, "terminal")?;
    let terminal = normalize_terminal(&terminal, &cfg.terminals);
    let roll_no = parse_roll_no(&form.header.roll_no)?;

    let errors = validate_entries(&form.entries, &cfg.rules);
    if !errors.is_empty() {
        let first = errors.first_message().unwrap_or_default().to_string();
        return Err(MarksError::RuleViolation { first, errors });
    }

    let marks = collect_marks(&form.entries, &cfg.rules)?;
    Ok(SubmissionPayload {
        class,
        section,
        terminal,
        roll_no,
        marks,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTotal {
    pub subject_name: Option<String>,
    pub obtained: f64,
    pub full_marks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksSummary {
    pub subjects: Vec<SubjectTotal>,
    pub obtained: f64,
    pub full_marks: u32,
    pub percentage: Option<f64>,
}

fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Running totals for display next to the form.
pub fn summarize(entries: &[MarkEntry], cfg: &RuleConfig) -> MarksSummary {
    let subjects: Vec<SubjectTotal> = entries
        .iter()
        .map(|entry| {
            let rule = entry.rule(cfg);
            let internal = if rule.internal_allowed {
                entry.internal_marks.unwrap_or(0.0)
            } else {
                0.0
            };
            SubjectTotal {
                subject_name: entry.subject_name.clone(),
                obtained: entry.external_marks.unwrap_or(0.0) + internal,
                full_marks: rule.full_marks(),
            }
        })
        .collect();

    let obtained: f64 = subjects.iter().map(|s| s.obtained).sum();
    let full_marks: u32 = subjects.iter().map(|s| s.full_marks).sum();
    let percentage = (full_marks > 0).then(|| round_2(100.0 * obtained / f64::from(full_marks)));

    MarksSummary {
        subjects,
        obtained,
        full_marks,
        percentage,
    }
}

//! Typed contracts for the two backend responses the rule engine consumes:
//! the subjects-for-class lookup and the marks submission result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MarksError, Result};

pub const MSG_DUPLICATE: &str = "marks already submitted for this student and terminal";
pub const MSG_SUBMIT_FAILED: &str = "failed to submit marks";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl SubjectDescriptor {
    #[cfg(test)]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    #[serde(default, alias = "subject_id", alias = "_id")]
    id: Option<SubjectId>,
    #[serde(default, alias = "subject_name", alias = "subjectName")]
    name: Option<String>,
    #[serde(default, alias = "subject_code", alias = "subjectCode")]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectsBody {
    List(Vec<RawSubject>),
    Wrapped { subjects: Vec<RawSubject> },
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawSubject {
    fn normalize(self) -> Option<SubjectDescriptor> {
        let name = non_blank(self.name)?;
        let id = match self.id {
            Some(SubjectId::Text(s)) => non_blank(Some(s)),
            Some(SubjectId::Number(n)) => Some(n.to_string()),
            None => None,
        };
        Some(SubjectDescriptor {
            id,
            name,
            code: non_blank(self.code),
        })
    }
}

/// Parses a subjects lookup body. Descriptors without a name are dropped.
pub fn parse_subjects(body: &Value) -> Result<Vec<SubjectDescriptor>> {
    let parsed = SubjectsBody::deserialize(body).map_err(|e| MarksError::BackendContract {
        message: format!("subjects: {}", e),
    })?;
    let raw = match parsed {
        SubjectsBody::List(v) => v,
        SubjectsBody::Wrapped { subjects } => subjects,
    };
    Ok(raw.into_iter().filter_map(RawSubject::normalize).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubmissionOutcome {
    Accepted { message: Option<String> },
    Duplicate { message: String },
    Rejected { message: String },
}

impl SubmissionOutcome {
    pub fn into_result(self) -> Result<Option<String>> {
        match self {
            Self::Accepted { message } => Ok(message),
            Self::Duplicate { message } | Self::Rejected { message } => {
                Err(MarksError::BackendRejection { message })
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    message: Option<Value>,
    error: Option<Value>,
    /// Kept loose: only an array of items is inspected.
    errors: Option<Value>,
}

fn text(v: Option<Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => non_blank(Some(s)),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorItem {
    Text(String),
    Detail {
        #[serde(default)]
        msg: Option<Value>,
        #[serde(default)]
        message: Option<Value>,
    },
}

impl ErrorItem {
    fn message(self) -> Option<String> {
        match self {
            Self::Text(s) => non_blank(Some(s)),
            Self::Detail { msg, message } => text(msg).or_else(|| text(message)),
        }
    }
}

fn first_error_item(errors: Option<&Value>) -> Option<String> {
    errors
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|item| ErrorItem::deserialize(item).ok())
        .find_map(ErrorItem::message)
}

/// Classifies a submission response from its HTTP status and JSON body.
pub fn interpret_submission(status: u16, body: &Value) -> SubmissionOutcome {
    // Non-object bodies (plain text, null) carry no structured detail.
    let parsed = ErrorBody::deserialize(body).unwrap_or_default();

    if (200..300).contains(&status) {
        return SubmissionOutcome::Accepted {
            message: text(parsed.message),
        };
    }

    let body_message = text(parsed.message).or_else(|| text(parsed.error));
    if status == 409 {
        return SubmissionOutcome::Duplicate {
            message: body_message.unwrap_or_else(|| MSG_DUPLICATE.to_string()),
        };
    }

    let message = first_error_item(parsed.errors.as_ref())
        .or(body_message)
        .unwrap_or_else(|| MSG_SUBMIT_FAILED.to_string());
    SubmissionOutcome::Rejected { message }
}

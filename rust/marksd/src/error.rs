use thiserror::Error;

use crate::marks::ErrorMap;

#[derive(Error, Debug)]
pub enum MarksError {
    /// One or more marks are outside the subject's caps.
    #[error("{first}")]
    RuleViolation { first: String, errors: ErrorMap },

    /// A required selection is missing or nothing would be submitted.
    #[error("{message}")]
    Incomplete { message: String },

    /// The backend refused a submission; message is surfaced verbatim.
    #[error("{message}")]
    BackendRejection { message: String },

    #[error("backend response does not match the expected contract: {message}")]
    BackendContract { message: String },

    #[error("entry index {index} out of range (form has {len} entries)")]
    EntryOutOfRange { index: usize, len: usize },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl MarksError {
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::Incomplete {
            message: message.into(),
        }
    }

    /// Protocol error code for the sidecar envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RuleViolation { .. } => "rule_violation",
            Self::Incomplete { .. } => "incomplete",
            Self::BackendRejection { .. } => "backend_rejection",
            Self::BackendContract { .. } => "backend_contract",
            Self::EntryOutOfRange { .. } | Self::Config { .. } => "bad_params",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::RuleViolation { errors, .. } => serde_json::to_value(errors).ok(),
            Self::EntryOutOfRange { index, len } => {
                Some(serde_json::json!({ "index": index, "len": len }))
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MarksError>;

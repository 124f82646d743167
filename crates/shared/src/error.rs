use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::QuestionId;

/// Error body returned by the report service on a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// The server-supplied message, if it carries any text.
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .filter(|message| !message.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is required")]
    MissingName,
    #[error("please answer: {prompt}")]
    Unanswered {
        id: QuestionId,
        prompt: &'static str,
    },
    #[error("'{value}' is not a valid answer for \"{prompt}\" (expected one of: {expected})")]
    InvalidChoice {
        id: QuestionId,
        prompt: &'static str,
        value: String,
        expected: String,
    },
    #[error("'{value}' is not a whole number for \"{prompt}\"")]
    NotANumber {
        id: QuestionId,
        prompt: &'static str,
        value: String,
    },
    #[error("'{value}' is not valid for \"{prompt}\" (expected {expected})")]
    WrongKind {
        id: QuestionId,
        prompt: &'static str,
        value: String,
        expected: String,
    },
}

impl ValidationError {
    pub fn question(&self) -> Option<QuestionId> {
        match self {
            ValidationError::MissingName => None,
            ValidationError::Unanswered { id, .. }
            | ValidationError::InvalidChoice { id, .. }
            | ValidationError::NotANumber { id, .. }
            | ValidationError::WrongKind { id, .. } => Some(*id),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodedImageError {
    #[error("encoded image must be a base64 data URL")]
    NotADataUrl,
    #[error("encoded image has an empty mime type")]
    MissingMimeType,
    #[error("encoded image payload is not valid base64: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

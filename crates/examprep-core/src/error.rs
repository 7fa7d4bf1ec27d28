//! Error types for the session engine and the analysis pipeline.
//!
//! Session errors are contract violations and are returned immediately.
//! Analysis issues never abort a report; they are collected as diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionStatus;

/// Errors raised by [`TestSession`](crate::session::TestSession) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The operation is not allowed in the session's current state.
    #[error("cannot {operation} while the session is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    /// A question index outside `0..count`.
    #[error("question index {index} out of range (test has {count} questions)")]
    InvalidIndex { index: usize, count: usize },

    /// The answer value does not fit the question.
    #[error("invalid answer for question {question_id}: {reason}")]
    InvalidAnswer { question_id: String, reason: String },

    /// The test was started without any questions loaded.
    #[error("cannot start a test with no questions")]
    NoQuestions,

    /// The countdown reached zero; only submission is allowed.
    #[error("time is up, the attempt can only be submitted")]
    TimeExpired,
}

/// Errors raised by the [`SessionEngine`](crate::engine::SessionEngine) handle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The engine task has stopped (abandoned or panicked).
    #[error("session engine has shut down")]
    Closed,
}

/// A metadata field the analysis needs for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataField {
    Subject,
    Difficulty,
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataField::Subject => write!(f, "subject"),
            MetadataField::Difficulty => write!(f, "difficulty"),
        }
    }
}

/// A question that was left out of one or more aggregations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisIssue {
    /// No metadata record exists for a question in the attempt.
    #[error("no metadata for question {question_id}")]
    MissingMetadata { question_id: String },

    /// Metadata exists but a field is missing or unrecognized.
    #[error("question {question_id} has no usable {missing}")]
    IncompleteMetadata {
        question_id: String,
        missing: MetadataField,
    },
}

impl AnalysisIssue {
    pub fn question_id(&self) -> &str {
        match self {
            AnalysisIssue::MissingMetadata { question_id }
            | AnalysisIssue::IncompleteMetadata { question_id, .. } => question_id,
        }
    }
}

//! Error types surfaced by the classification core

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which artifact file could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Schema,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Schema => write!(f, "feature schema"),
        }
    }
}

/// The model or its feature schema is absent, unreadable or malformed.
///
/// Nothing can be served without both, so this stops the process before it
/// accepts submissions.
#[derive(Error, Debug)]
#[error("missing {kind} artifact at {}: {reason}", .path.display())]
pub struct MissingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub reason: String,
}

impl MissingArtifact {
    pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// The classifier rejected or failed on a reconciled row.
///
/// Contained to the submission that caused it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("prediction failed: {message}")]
pub struct PredictionFailed {
    /// Underlying classifier error text
    pub message: String,
}

impl PredictionFailed {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A submitted form value violates the field's declared type or range
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("field '{field}' expects {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: String,
    },

    #[error("field '{field}' value {value} is outside {min}..={max}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("field '{field}' value '{value}' is not one of the allowed choices")]
    UnknownChoice { field: String, value: String },

    #[error("field '{field}' has an unsupported value: {reason}")]
    Unsupported { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_message() {
        let err = MissingArtifact::new(
            ArtifactKind::Model,
            "models/sleep_disorder.onnx",
            "No such file or directory",
        );
        let msg = err.to_string();
        assert!(msg.contains("model artifact"));
        assert!(msg.contains("models/sleep_disorder.onnx"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn test_prediction_failed_preserves_message() {
        let err = PredictionFailed::new("unseen category 'Pilot' for column 'Occupation'");
        assert!(err.to_string().contains("unseen category 'Pilot'"));
    }
}

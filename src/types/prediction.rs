//! Prediction results and the response sent back for each submission

use crate::reconciler::Diagnostics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probability assigned to one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Outcome of a successful classifier invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted sleep disorder category
    pub label: String,
    /// Class probabilities in the classifier's own class order, when it exposes them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<ClassProbability>>,
}

impl PredictionResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            probabilities: None,
        }
    }

    pub fn with_probabilities(mut self, probabilities: Vec<ClassProbability>) -> Self {
        self.probabilities = Some(probabilities);
        self
    }

    /// Probability of a given class, if probabilities were produced
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .as_ref()?
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }
}

/// Response for one submission, handed to the display layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResponse {
    /// Unique submission identifier
    pub submission_id: String,

    /// When the submission was processed
    pub timestamp: DateTime<Utc>,

    /// Schema mismatches found while reconciling (non-fatal)
    pub diagnostics: Diagnostics,

    /// Prediction, when the classifier succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,

    /// Readable error, when the submission or the classifier failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssessmentResponse {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            submission_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            diagnostics,
            prediction: None,
            error: None,
        }
    }

    pub fn with_prediction(mut self, prediction: PredictionResult) -> Self {
        self.prediction = Some(prediction);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.prediction.is_some()
    }
}

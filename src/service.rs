//! One submission, end to end: collect, reconcile, predict, respond.

use crate::form::{record_from_json, FormSpec};
use crate::metrics::ServiceMetrics;
use crate::models::{predict, LoadedArtifact};
use crate::reconciler::{reconcile, Diagnostics};
use crate::types::{AssessmentResponse, RawInputRecord};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Handles assessment submissions against a loaded artifact.
///
/// Holds no per-submission state; each call is independent.
pub struct AssessmentService {
    artifact: Arc<LoadedArtifact>,
    /// Form checks applied before reconciliation, if enabled
    form: Option<FormSpec>,
    metrics: Arc<ServiceMetrics>,
}

impl AssessmentService {
    pub fn new(artifact: Arc<LoadedArtifact>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            artifact,
            form: None,
            metrics,
        }
    }

    /// Check submissions against `form` before reconciling them
    pub fn with_form(mut self, form: FormSpec) -> Self {
        self.form = Some(form);
        self
    }

    pub fn artifact(&self) -> &LoadedArtifact {
        &self.artifact
    }

    /// Handle a JSON submission payload
    pub fn handle_payload(&self, payload: &[u8]) -> AssessmentResponse {
        let start_time = Instant::now();

        let response = match serde_json::from_slice::<Map<String, Value>>(payload) {
            Ok(submission) => self.handle_submission(&submission),
            Err(e) => {
                warn!(error = %e, "Failed to deserialize submission");
                self.metrics.record_rejection();
                AssessmentResponse::new(Diagnostics::default())
                    .with_error(format!("invalid submission: {}", e))
            }
        };

        self.metrics.record_submission(start_time.elapsed());
        response
    }

    /// Handle an already-parsed JSON object
    pub fn handle_submission(&self, submission: &Map<String, Value>) -> AssessmentResponse {
        let collected = match &self.form {
            Some(form) => form.collect(submission),
            None => record_from_json(submission),
        };

        match collected {
            Ok(raw) => self.assess(&raw),
            Err(e) => {
                warn!(error = %e, "Submission rejected by form");
                self.metrics.record_rejection();
                AssessmentResponse::new(Diagnostics::default())
                    .with_error(format!("invalid submission: {}", e))
            }
        }
    }

    /// Reconcile a raw record with the model schema and run the classifier
    pub fn assess(&self, raw: &RawInputRecord) -> AssessmentResponse {
        let (row, diagnostics) = reconcile(raw, &self.artifact.schema);
        if !diagnostics.is_clean() {
            self.metrics.record_reconciliation_warning();
        }

        let response = AssessmentResponse::new(diagnostics);

        match predict(&self.artifact.classifier, &row) {
            Ok(prediction) => {
                self.metrics.record_prediction(&prediction.label);
                info!(
                    submission_id = %response.submission_id,
                    label = %prediction.label,
                    "Sleep disorder predicted"
                );
                response.with_prediction(prediction)
            }
            Err(e) => {
                self.metrics.record_prediction_failure();
                response.with_error(e.to_string())
            }
        }
    }
}

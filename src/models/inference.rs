//! Inference invoker: runs the classifier on one reconciled row

use crate::error::PredictionFailed;
use crate::models::classifier::ClassifierHandle;
use crate::types::{ClassProbability, PredictionResult, ReconciledRow};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Allowed drift of a probability distribution's sum from 1.0
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Predict the label for `row`, plus class probabilities when the classifier
/// exposes them.
///
/// Any error or panic from the classifier becomes [`PredictionFailed`]; the
/// handle stays usable for the next call.
pub fn predict(
    classifier: &ClassifierHandle,
    row: &ReconciledRow,
) -> Result<PredictionResult, PredictionFailed> {
    let result = match classifier {
        ClassifierHandle::Basic(c) => {
            let label = guarded(|| c.predict(row))?;
            PredictionResult::new(label)
        }
        ClassifierHandle::Probabilistic(c) => {
            let (label, probabilities) = guarded(|| c.predict_with_probabilities(row))?;
            let paired = pair_with_labels(c.class_labels(), probabilities)?;
            PredictionResult::new(label).with_probabilities(paired)
        }
    };

    debug!(
        classifier = %classifier.name(),
        label = %result.label,
        missing_cells = row.missing_count(),
        "Prediction complete"
    );

    Ok(result)
}

/// Run a classifier call, converting errors and panics into `PredictionFailed`
fn guarded<T>(call: impl FnOnce() -> anyhow::Result<T>) -> Result<T, PredictionFailed> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "classifier panicked".to_string());
        Err(anyhow::anyhow!("classifier panicked: {}", message))
    });

    outcome.map_err(|e| {
        let failure = PredictionFailed::new(format!("{:#}", e));
        error!(error = %failure.message, "Classifier invocation failed");
        failure
    })
}

fn pair_with_labels(
    labels: &[String],
    probabilities: Vec<f64>,
) -> Result<Vec<ClassProbability>, PredictionFailed> {
    if labels.len() != probabilities.len() {
        let failure = PredictionFailed::new(format!(
            "classifier returned {} probabilities for {} classes",
            probabilities.len(),
            labels.len()
        ));
        error!(error = %failure.message, "Probability output rejected");
        return Err(failure);
    }

    if let Some(p) = probabilities.iter().find(|p| !p.is_finite()) {
        return Err(PredictionFailed::new(format!(
            "classifier returned a non-finite probability ({})",
            p
        )));
    }

    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        warn!(sum = sum, "Class probabilities do not sum to 1");
    }

    Ok(labels
        .iter()
        .cloned()
        .zip(probabilities)
        .map(|(label, probability)| ClassProbability { label, probability })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::{Classifier, ProbabilisticClassifier};
    use crate::reconciler::reconcile;
    use crate::types::{FeatureSchema, FeatureValue, RawInputRecord};
    use anyhow::{bail, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct OccupationClassifier;

    impl Classifier for OccupationClassifier {
        fn name(&self) -> &str {
            "occupation"
        }

        fn predict(&self, row: &ReconciledRow) -> Result<String> {
            match row.get("Occupation") {
                Some(FeatureValue::Category(o)) if o == "Pilot" => {
                    bail!("Found unknown categories ['Pilot'] in column 1 during transform")
                }
                Some(FeatureValue::Category(o)) if o == "Nurse" => Ok("Sleep Apnea".to_string()),
                _ => Ok("None".to_string()),
            }
        }
    }

    struct ProbaClassifier {
        labels: Vec<String>,
        probabilities: Vec<f64>,
    }

    impl Classifier for ProbaClassifier {
        fn name(&self) -> &str {
            "proba"
        }

        fn predict(&self, _row: &ReconciledRow) -> Result<String> {
            Ok("Insomnia".to_string())
        }
    }

    impl ProbabilisticClassifier for ProbaClassifier {
        fn class_labels(&self) -> &[String] {
            &self.labels
        }

        fn predict_probabilities(&self, _row: &ReconciledRow) -> Result<Vec<f64>> {
            Ok(self.probabilities.clone())
        }
    }

    /// Counts evaluations; each one returns the next label in turn
    struct CountingClassifier {
        labels: Vec<String>,
        evaluations: Arc<AtomicUsize>,
    }

    impl CountingClassifier {
        fn evaluate(&self) -> (String, Vec<f64>) {
            let n = self.evaluations.fetch_add(1, Ordering::SeqCst);
            let mut probabilities = vec![0.1; self.labels.len()];
            let winner = n % self.labels.len();
            probabilities[winner] = 0.8;
            (self.labels[winner].clone(), probabilities)
        }
    }

    impl Classifier for CountingClassifier {
        fn name(&self) -> &str {
            "counting"
        }

        fn predict(&self, _row: &ReconciledRow) -> Result<String> {
            Ok(self.evaluate().0)
        }
    }

    impl ProbabilisticClassifier for CountingClassifier {
        fn class_labels(&self) -> &[String] {
            &self.labels
        }

        fn predict_probabilities(&self, _row: &ReconciledRow) -> Result<Vec<f64>> {
            Ok(self.evaluate().1)
        }

        fn predict_with_probabilities(&self, _row: &ReconciledRow) -> Result<(String, Vec<f64>)> {
            Ok(self.evaluate())
        }
    }

    struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn name(&self) -> &str {
            "panicking"
        }

        fn predict(&self, row: &ReconciledRow) -> Result<String> {
            if row.is_empty() {
                panic!("empty row");
            }
            Ok("None".to_string())
        }
    }

    fn row(occupation: &str) -> ReconciledRow {
        let schema = FeatureSchema::new(["Age", "Occupation"]).unwrap();
        let raw = RawInputRecord::new().with("Age", 40).with("Occupation", occupation);
        reconcile(&raw, &schema).0
    }

    fn labels() -> Vec<String> {
        vec![
            "Insomnia".to_string(),
            "None".to_string(),
            "Sleep Apnea".to_string(),
        ]
    }

    #[test]
    fn test_basic_prediction() {
        let handle = ClassifierHandle::basic(OccupationClassifier);
        let result = predict(&handle, &row("Nurse")).unwrap();

        assert_eq!(result.label, "Sleep Apnea");
        assert!(result.probabilities.is_none());
    }

    #[test]
    fn test_failure_preserves_message_and_recovers() {
        let handle = ClassifierHandle::basic(OccupationClassifier);

        let err = predict(&handle, &row("Pilot")).unwrap_err();
        assert!(err.message.contains("unknown categories ['Pilot']"));

        let next = predict(&handle, &row("Teacher")).unwrap();
        assert_eq!(next.label, "None");
    }

    #[test]
    fn test_probabilities_paired_in_classifier_order() {
        let handle = ClassifierHandle::probabilistic(ProbaClassifier {
            labels: labels(),
            probabilities: vec![0.6, 0.3, 0.1],
        });

        let result = predict(&handle, &row("Doctor")).unwrap();
        let probabilities = result.probabilities.clone().unwrap();

        assert_eq!(result.label, "Insomnia");
        assert_eq!(
            probabilities.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
            vec!["Insomnia", "None", "Sleep Apnea"]
        );
        assert_eq!(result.probability_of("None"), Some(0.3));
        let sum: f64 = probabilities.iter().map(|p| p.probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_and_probabilities_from_one_evaluation() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let handle = ClassifierHandle::probabilistic(CountingClassifier {
            labels: labels(),
            evaluations: Arc::clone(&evaluations),
        });

        for _ in 0..3 {
            let result = predict(&handle, &row("Doctor")).unwrap();
            // the label is the class the distribution ranks highest
            assert_eq!(result.probability_of(&result.label), Some(0.8));
        }
        assert_eq!(evaluations.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_probability_arity_mismatch() {
        let handle = ClassifierHandle::probabilistic(ProbaClassifier {
            labels: labels(),
            probabilities: vec![0.5, 0.5],
        });

        let err = predict(&handle, &row("Doctor")).unwrap_err();
        assert!(err.message.contains("2 probabilities for 3 classes"));
    }

    #[test]
    fn test_non_finite_probability() {
        let handle = ClassifierHandle::probabilistic(ProbaClassifier {
            labels: labels(),
            probabilities: vec![f64::NAN, 0.5, 0.5],
        });

        assert!(predict(&handle, &row("Doctor")).is_err());
    }

    #[test]
    fn test_panic_is_contained() {
        let handle = ClassifierHandle::basic(PanickingClassifier);
        let empty = reconcile(
            &RawInputRecord::new(),
            &FeatureSchema::new(Vec::<String>::new()).unwrap(),
        )
        .0;

        let err = predict(&handle, &empty).unwrap_err();
        assert!(err.message.contains("empty row"));

        assert_eq!(predict(&handle, &row("Nurse")).unwrap().label, "None");
    }

    #[test]
    fn test_all_missing_row_never_crashes() {
        let schema = FeatureSchema::new(["Age", "Occupation"]).unwrap();
        let (all_missing, _) = reconcile(&RawInputRecord::new(), &schema);
        let handle = ClassifierHandle::basic(OccupationClassifier);

        match predict(&handle, &all_missing) {
            Ok(result) => assert_eq!(result.label, "None"),
            Err(e) => assert!(!e.message.is_empty()),
        }
    }
}

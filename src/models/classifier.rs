//! Classifier capabilities

use crate::types::ReconciledRow;
use anyhow::Result;

/// A trained classifier that predicts a label for one reconciled row.
///
/// Implementations must not mutate observable state at inference time; the
/// same handle serves every submission.
pub trait Classifier: Send + Sync {
    /// Short backend name, used in logs
    fn name(&self) -> &str;

    /// Predict the class label for a single row
    fn predict(&self, row: &ReconciledRow) -> Result<String>;
}

/// A classifier that can also report a class probability distribution.
pub trait ProbabilisticClassifier: Classifier {
    /// Class labels in the order [`predict_probabilities`](Self::predict_probabilities)
    /// reports them
    fn class_labels(&self) -> &[String];

    /// Probability for each class, aligned with [`class_labels`](Self::class_labels)
    fn predict_probabilities(&self, row: &ReconciledRow) -> Result<Vec<f64>>;

    /// Label and probabilities together. Backends that get both from one
    /// evaluation should override this so the two always agree.
    fn predict_with_probabilities(&self, row: &ReconciledRow) -> Result<(String, Vec<f64>)> {
        Ok((self.predict(row)?, self.predict_probabilities(row)?))
    }
}

/// A loaded classifier together with what it can do
pub enum ClassifierHandle {
    Basic(Box<dyn Classifier>),
    Probabilistic(Box<dyn ProbabilisticClassifier>),
}

impl ClassifierHandle {
    pub fn basic(classifier: impl Classifier + 'static) -> Self {
        ClassifierHandle::Basic(Box::new(classifier))
    }

    pub fn probabilistic(classifier: impl ProbabilisticClassifier + 'static) -> Self {
        ClassifierHandle::Probabilistic(Box::new(classifier))
    }

    pub fn name(&self) -> &str {
        match self {
            ClassifierHandle::Basic(c) => c.name(),
            ClassifierHandle::Probabilistic(c) => c.name(),
        }
    }

    pub fn supports_probabilities(&self) -> bool {
        matches!(self, ClassifierHandle::Probabilistic(_))
    }

    /// Class labels, for classifiers that report probabilities
    pub fn class_labels(&self) -> Option<&[String]> {
        match self {
            ClassifierHandle::Basic(_) => None,
            ClassifierHandle::Probabilistic(c) => Some(c.class_labels()),
        }
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.supports_probabilities() {
            "Probabilistic"
        } else {
            "Basic"
        };
        f.debug_struct("ClassifierHandle")
            .field("kind", &kind)
            .field("name", &self.name())
            .finish()
    }
}

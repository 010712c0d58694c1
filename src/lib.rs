//! Sleep Disorder Classifier Library
//!
//! Aligns sleep health and lifestyle form input with the feature schema of a
//! pre-trained classifier and reports the predicted sleep disorder category.

pub mod config;
pub mod consumer;
pub mod error;
pub mod form;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod reconciler;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use error::{ArtifactKind, FormError, MissingArtifact, PredictionFailed};
pub use form::FormSpec;
pub use models::{predict, ArtifactLoader, ClassifierHandle, LoadedArtifact};
pub use reconciler::{reconcile, Diagnostics};
pub use service::AssessmentService;
pub use types::{FeatureSchema, FeatureValue, PredictionResult, RawInputRecord, ReconciledRow};

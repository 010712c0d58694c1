//! Type definitions for the sleep disorder classifier

pub mod prediction;
pub mod record;
pub mod schema;

pub use prediction::{AssessmentResponse, ClassProbability, PredictionResult};
pub use record::{FeatureValue, RawInputRecord, ReconciledRow};
pub use schema::{FeatureSchema, SchemaSidecar};

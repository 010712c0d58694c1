//! Classifier loading and inference components

pub mod classifier;
pub mod inference;
pub mod loader;
pub mod onnx;

pub use classifier::{Classifier, ClassifierHandle, ProbabilisticClassifier};
pub use inference::predict;
pub use loader::{ArtifactLoader, LoadedArtifact, ModelBackend};
pub use onnx::{MissingSentinel, OnnxBackend};

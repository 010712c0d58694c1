//! Artifact loader: the trained model plus its feature schema sidecar

use crate::error::{ArtifactKind, MissingArtifact};
use crate::models::classifier::ClassifierHandle;
use crate::types::{FeatureSchema, SchemaSidecar};
use anyhow::Result;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Deserializes a model file into a classifier.
///
/// The loader checks that artifact files exist and parses the schema; the
/// backend only turns the model bytes into something that can predict.
pub trait ModelBackend: Send + Sync {
    /// Backend name, used in logs
    fn name(&self) -> &'static str;

    /// Load the classifier stored at `model_path`
    fn load_classifier(&self, model_path: &Path, sidecar: &SchemaSidecar)
        -> Result<ClassifierHandle>;
}

/// Classifier and feature schema loaded once at startup.
///
/// Immutable after load; share it behind an `Arc` across submissions.
#[derive(Debug)]
pub struct LoadedArtifact {
    pub classifier: ClassifierHandle,
    pub schema: FeatureSchema,
    pub model_path: PathBuf,
}

/// Loader for the model and schema artifacts
pub struct ArtifactLoader {
    backend: Box<dyn ModelBackend>,
}

impl ArtifactLoader {
    /// Create a loader that deserializes models with the given backend
    pub fn new(backend: impl ModelBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Load the classifier and its feature schema.
    ///
    /// Every failure, including a backend that cannot deserialize the model,
    /// is reported as [`MissingArtifact`].
    pub fn load<P, Q>(&self, model_path: P, schema_path: Q) -> Result<LoadedArtifact, MissingArtifact>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let model_path = model_path.as_ref();
        let schema_path = schema_path.as_ref();

        let result = self.load_inner(model_path, schema_path);
        if let Err(e) = &result {
            error!(kind = %e.kind, path = %e.path.display(), reason = %e.reason, "Artifact load failed");
        }
        result
    }

    fn load_inner(
        &self,
        model_path: &Path,
        schema_path: &Path,
    ) -> Result<LoadedArtifact, MissingArtifact> {
        ensure_readable_file(ArtifactKind::Model, model_path)?;
        let sidecar = read_sidecar(schema_path)?;

        info!(
            backend = self.backend.name(),
            path = %model_path.display(),
            "Loading model artifact"
        );

        let classifier = self
            .backend
            .load_classifier(model_path, &sidecar)
            .map_err(|e| MissingArtifact::new(ArtifactKind::Model, model_path, format!("{:#}", e)))?;

        info!(
            classifier = %classifier.name(),
            columns = sidecar.schema.len(),
            probabilities = classifier.supports_probabilities(),
            "Artifacts loaded successfully"
        );

        Ok(LoadedArtifact {
            classifier,
            schema: sidecar.schema,
            model_path: model_path.to_path_buf(),
        })
    }
}

fn ensure_readable_file(kind: ArtifactKind, path: &Path) -> Result<(), MissingArtifact> {
    let metadata = fs::metadata(path).map_err(|e| MissingArtifact::new(kind, path, e))?;
    if !metadata.is_file() {
        return Err(MissingArtifact::new(kind, path, "not a regular file"));
    }
    File::open(path).map_err(|e| MissingArtifact::new(kind, path, e))?;
    Ok(())
}

/// Read and parse the schema sidecar
pub fn read_sidecar(path: &Path) -> Result<SchemaSidecar, MissingArtifact> {
    ensure_readable_file(ArtifactKind::Schema, path)?;

    info!(path = %path.display(), "Loading feature schema");

    let json = fs::read_to_string(path)
        .map_err(|e| MissingArtifact::new(ArtifactKind::Schema, path, e))?;

    SchemaSidecar::from_json(&json).map_err(|reason| {
        MissingArtifact::new(
            ArtifactKind::Schema,
            path,
            format!("invalid schema sidecar: {}", reason),
        )
    })
}

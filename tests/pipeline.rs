//! End-to-end load → reconcile → predict scenarios with a stand-in backend

use anyhow::{bail, Result};
use sleep_disorder_classifier::models::{
    Classifier, ClassifierHandle, ModelBackend, ProbabilisticClassifier,
};
use sleep_disorder_classifier::types::SchemaSidecar;
use sleep_disorder_classifier::{
    predict, reconcile, ArtifactKind, ArtifactLoader, FeatureValue, RawInputRecord, ReconciledRow,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "feature_columns": ["Age", "Gender", "Occupation", "Sleep Duration", "BMI Category",
                        "Heart Rate", "Daily Steps", "BP_Systolic", "BP_Diastolic"],
    "class_labels": ["Insomnia", "None", "Sleep Apnea"]
}"#;

/// Rejects occupations it never saw, otherwise predicts from BMI category
struct LookupClassifier {
    labels: Vec<String>,
}

impl LookupClassifier {
    fn occupation_known(row: &ReconciledRow) -> Result<()> {
        match row.get("Occupation") {
            Some(FeatureValue::Category(o)) if o == "Astronaut" => {
                bail!("Found unknown categories ['Astronaut'] in column 2 during transform")
            }
            _ => Ok(()),
        }
    }
}

impl Classifier for LookupClassifier {
    fn name(&self) -> &str {
        "lookup"
    }

    fn predict(&self, row: &ReconciledRow) -> Result<String> {
        Self::occupation_known(row)?;
        Ok(match row.get("BMI Category") {
            Some(FeatureValue::Category(c)) if c == "Obese" => "Sleep Apnea",
            Some(FeatureValue::Category(c)) if c == "Overweight" => "Insomnia",
            _ => "None",
        }
        .to_string())
    }
}

impl ProbabilisticClassifier for LookupClassifier {
    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_probabilities(&self, row: &ReconciledRow) -> Result<Vec<f64>> {
        Self::occupation_known(row)?;
        Ok(match self.predict(row)?.as_str() {
            "Insomnia" => vec![0.8, 0.15, 0.05],
            "Sleep Apnea" => vec![0.1, 0.1, 0.8],
            _ => vec![0.1, 0.85, 0.05],
        })
    }
}

struct LookupBackend;

impl ModelBackend for LookupBackend {
    fn name(&self) -> &'static str {
        "lookup"
    }

    fn load_classifier(&self, _path: &Path, sidecar: &SchemaSidecar) -> Result<ClassifierHandle> {
        Ok(ClassifierHandle::probabilistic(LookupClassifier {
            labels: sidecar.class_labels.clone(),
        }))
    }
}

fn artifact_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sleep_disorder_pipeline.onnx"), b"model").unwrap();
    fs::write(dir.path().join("feature_info.json"), SCHEMA).unwrap();
    dir
}

fn scenario_input() -> RawInputRecord {
    RawInputRecord::new()
        .with("Age", 30)
        .with("Gender", "Male")
        .with("Occupation", "Software Engineer")
        .with("Sleep Duration", 6.5)
        .with("BMI Category", "Normal")
        .with("Heart Rate", 75)
        .with("Daily Steps", 6000)
}

#[test]
fn test_missing_blood_pressure_fields() {
    let dir = artifact_dir();
    let artifact = ArtifactLoader::new(LookupBackend)
        .load(
            dir.path().join("sleep_disorder_pipeline.onnx"),
            dir.path().join("feature_info.json"),
        )
        .unwrap();

    let (row, diagnostics) = reconcile(&scenario_input(), &artifact.schema);

    assert_eq!(row.len(), 9);
    assert_eq!(row.get("BP_Systolic"), Some(&FeatureValue::Missing));
    assert_eq!(row.get("BP_Diastolic"), Some(&FeatureValue::Missing));
    assert_eq!(diagnostics.missing, vec!["BP_Systolic", "BP_Diastolic"]);
    assert!(diagnostics.extra.is_empty());

    let result = predict(&artifact.classifier, &row).unwrap();
    assert_eq!(result.label, "None");
    assert_eq!(result.probability_of("None"), Some(0.85));
}

#[test]
fn test_extra_field_reported_and_dropped() {
    let dir = artifact_dir();
    let artifact = ArtifactLoader::new(LookupBackend)
        .load(
            dir.path().join("sleep_disorder_pipeline.onnx"),
            dir.path().join("feature_info.json"),
        )
        .unwrap();

    let raw = scenario_input().with("Quality of Sleep", 7);
    let (row, diagnostics) = reconcile(&raw, &artifact.schema);

    assert_eq!(diagnostics.extra, vec!["Quality of Sleep"]);
    assert!(row.get("Quality of Sleep").is_none());
    assert!(predict(&artifact.classifier, &row).is_ok());
}

#[test]
fn test_missing_model_file() {
    let dir = artifact_dir();
    let err = ArtifactLoader::new(LookupBackend)
        .load(
            dir.path().join("no_such_model.onnx"),
            dir.path().join("feature_info.json"),
        )
        .unwrap_err();

    assert_eq!(err.kind, ArtifactKind::Model);
    assert!(err.to_string().contains("no_such_model.onnx"));
}

#[test]
fn test_unseen_category_then_recovery() {
    let dir = artifact_dir();
    let artifact = ArtifactLoader::new(LookupBackend)
        .load(
            dir.path().join("sleep_disorder_pipeline.onnx"),
            dir.path().join("feature_info.json"),
        )
        .unwrap();

    let bad = scenario_input().with("Occupation", "Astronaut");
    let (row, _) = reconcile(&bad, &artifact.schema);
    let err = predict(&artifact.classifier, &row).unwrap_err();
    assert!(err
        .message
        .contains("Found unknown categories ['Astronaut']"));

    let good = scenario_input().with("BMI Category", "Obese");
    let (row, _) = reconcile(&good, &artifact.schema);
    let result = predict(&artifact.classifier, &row).unwrap();
    assert_eq!(result.label, "Sleep Apnea");
    assert_eq!(result.probability_of("Sleep Apnea"), Some(0.8));
}

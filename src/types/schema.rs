//! Feature schema and the sidecar file it is read from

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Ordered column names the classifier was trained on.
///
/// Cloning is cheap and shares the same column list; there are no mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Arc<[String]>,
}

impl FeatureSchema {
    /// Build a schema, rejecting duplicate column names.
    pub fn new<I, S>(columns: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(format!("duplicate column '{}'", column));
            }
        }

        Ok(Self {
            columns: columns.into(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Position of a column in training order
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Category-to-code tables for columns a dense model expects pre-encoded
pub type CategoricalEncodings = BTreeMap<String, BTreeMap<String, f32>>;

/// Contents of the schema sidecar that ships next to the model.
///
/// Either a bare list of column names or an object carrying the columns plus
/// optional class labels and categorical encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SidecarFile {
    Columns(Vec<String>),
    Described {
        feature_columns: Vec<String>,
        #[serde(default)]
        class_labels: Vec<String>,
        #[serde(default)]
        categorical_encodings: CategoricalEncodings,
    },
}

/// Parsed schema sidecar
#[derive(Debug, Clone)]
pub struct SchemaSidecar {
    pub schema: FeatureSchema,
    /// Class label ordering of the probability output, when known
    pub class_labels: Vec<String>,
    pub categorical_encodings: CategoricalEncodings,
}

impl SchemaSidecar {
    /// Parse sidecar JSON
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: SidecarFile = serde_json::from_str(json).map_err(|e| e.to_string())?;

        let (columns, class_labels, categorical_encodings) = match file {
            SidecarFile::Columns(columns) => (columns, Vec::new(), CategoricalEncodings::new()),
            SidecarFile::Described {
                feature_columns,
                class_labels,
                categorical_encodings,
            } => (feature_columns, class_labels, categorical_encodings),
        };

        let schema = FeatureSchema::new(columns)?;

        if let Some(column) = categorical_encodings
            .keys()
            .find(|column| !schema.contains(column))
        {
            return Err(format!(
                "categorical encoding given for unknown column '{}'",
                column
            ));
        }

        Ok(Self {
            schema,
            class_labels,
            categorical_encodings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_rejects_duplicates() {
        let err = FeatureSchema::new(["Age", "Gender", "Age"]).unwrap_err();
        assert!(err.contains("Age"));
    }

    #[test]
    fn test_schema_position() {
        let schema = FeatureSchema::new(["Age", "Gender", "BMI Category"]).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.position("BMI Category"), Some(2));
        assert!(!schema.contains("Stress Level"));
    }

    #[test]
    fn test_sidecar_bare_list() {
        let sidecar = SchemaSidecar::from_json(r#"["Age", "Gender"]"#).unwrap();
        assert_eq!(sidecar.schema.columns(), &["Age", "Gender"]);
        assert!(sidecar.class_labels.is_empty());
        assert!(sidecar.categorical_encodings.is_empty());
    }

    #[test]
    fn test_sidecar_described() {
        let sidecar = SchemaSidecar::from_json(
            r#"{
                "feature_columns": ["Age", "Gender"],
                "class_labels": ["Insomnia", "None", "Sleep Apnea"],
                "categorical_encodings": {"Gender": {"Male": 1, "Female": 0}}
            }"#,
        )
        .unwrap();

        assert_eq!(sidecar.schema.len(), 2);
        assert_eq!(sidecar.class_labels.len(), 3);
        assert_eq!(sidecar.categorical_encodings["Gender"]["Male"], 1.0);
    }

    #[test]
    fn test_sidecar_malformed() {
        assert!(SchemaSidecar::from_json("{not json").is_err());
        assert!(SchemaSidecar::from_json(r#"{"columns": 3}"#).is_err());
        assert!(SchemaSidecar::from_json(
            r#"{"feature_columns": ["Age"], "categorical_encodings": {"Gender": {"Male": 1}}}"#
        )
        .is_err());
    }
}

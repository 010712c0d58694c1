//! Input records: raw form values and schema-aligned rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed feature value.
///
/// `Missing` is the placeholder for a column the user never supplied. How it
/// is materialised (NaN, an empty category, ...) is up to the classifier
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Integer(i64),
    Float(f64),
    Category(String),
    Missing,
}

impl FeatureValue {
    /// Whether this value is the missing-value placeholder
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Integer(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Integer(v) => write!(f, "{}", v),
            FeatureValue::Float(v) => write!(f, "{}", v),
            FeatureValue::Category(v) => write!(f, "{}", v),
            FeatureValue::Missing => write!(f, "<missing>"),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Integer(v)
    }
}

impl From<i32> for FeatureValue {
    fn from(v: i32) -> Self {
        FeatureValue::Integer(v as i64)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Category(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Category(v)
    }
}

/// Field values for one submission, keyed by human-readable field name.
///
/// Keys are unique; inserting an existing key replaces its value. A field
/// never holds [`FeatureValue::Missing`]: an unsupplied field is an absent key,
/// so JSON `null` deserializes to no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, FeatureValue>",
    into = "BTreeMap<String, FeatureValue>"
)]
pub struct RawInputRecord {
    fields: BTreeMap<String, FeatureValue>,
}

impl RawInputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value under the same name.
    /// Inserting `Missing` clears the field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        let name = name.into();
        let value: FeatureValue = value.into();
        match value {
            FeatureValue::Missing => {
                self.fields.remove(&name);
            }
            value => {
                self.fields.insert(name, value);
            }
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FeatureValue>> FromIterator<(K, V)> for RawInputRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawInputRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl From<BTreeMap<String, FeatureValue>> for RawInputRecord {
    fn from(fields: BTreeMap<String, FeatureValue>) -> Self {
        fields.into_iter().collect()
    }
}

impl From<RawInputRecord> for BTreeMap<String, FeatureValue> {
    fn from(record: RawInputRecord) -> Self {
        record.fields
    }
}

/// A single row whose columns are exactly the feature schema, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRow {
    cells: Vec<(String, FeatureValue)>,
}

impl ReconciledRow {
    /// Only the reconciler builds rows, so column order always follows a schema.
    pub(crate) fn from_cells(cells: Vec<(String, FeatureValue)>) -> Self {
        Self { cells }
    }

    /// Column names in schema order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Values in schema order
    pub fn values(&self) -> impl Iterator<Item = &FeatureValue> {
        self.cells.iter().map(|(_, value)| value)
    }

    /// `(column, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Number of cells holding the missing placeholder
    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|(_, v)| v.is_missing()).count()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_value_from_json() {
        let record: RawInputRecord = serde_json::from_str(
            r#"{"Age": 30, "Sleep Duration": 6.5, "Gender": "Male", "Blood Pressure": null}"#,
        )
        .unwrap();

        assert_eq!(record.get("Age"), Some(&FeatureValue::Integer(30)));
        assert_eq!(record.get("Sleep Duration"), Some(&FeatureValue::Float(6.5)));
        assert_eq!(
            record.get("Gender"),
            Some(&FeatureValue::Category("Male".to_string()))
        );
        assert!(!record.contains("Blood Pressure"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_insert_missing_clears_field() {
        let mut record = RawInputRecord::new()
            .with("Age", 30)
            .with("Stress Level", FeatureValue::Missing);
        assert!(!record.contains("Stress Level"));

        record.insert("Age", FeatureValue::Missing);
        assert!(record.is_empty());
    }

    #[test]
    fn test_record_serializes_as_plain_object() {
        let record = RawInputRecord::new().with("Age", 30).with("Gender", "Male");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"Age": 30, "Gender": "Male"}));
    }

    #[test]
    fn test_insert_last_write_wins() {
        let record = RawInputRecord::new()
            .with("Heart Rate", 70)
            .with("Heart Rate", 82);

        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Heart Rate"), Some(&FeatureValue::Integer(82)));
    }

    #[test]
    fn test_feature_value_display() {
        assert_eq!(FeatureValue::from(6.5).to_string(), "6.5");
        assert_eq!(FeatureValue::from("Nurse").to_string(), "Nurse");
        assert_eq!(FeatureValue::Missing.to_string(), "<missing>");
    }
}

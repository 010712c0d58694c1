//! Sleep assessment form: field declarations and submission collection.
//!
//! This is the collection layer in front of reconciliation. It turns a JSON
//! submission into a [`RawInputRecord`], filling absent fields with the
//! widget default and holding present fields to their declared type and
//! range. Keys the form does not declare pass through unchanged.

use crate::error::FormError;
use crate::types::{FeatureValue, RawInputRecord};
use serde_json::{Map, Value};

/// Input widget kind with its constraints
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Integer { min: i64, max: i64, default: i64 },
    Float { min: f64, max: f64, default: f64 },
    Choice { options: Vec<String>, default: String },
}

/// One form field
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
}

impl FormField {
    pub fn integer(name: &str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Integer { min, max, default },
        }
    }

    pub fn float(name: &str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Float { min, max, default },
        }
    }

    /// Choice field; the first option is the default
    pub fn choice(name: &str, options: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Choice {
                options: options.iter().map(|o| o.to_string()).collect(),
                default: options.first().map(|o| o.to_string()).unwrap_or_default(),
            },
        }
    }

    /// Value used when the submission omits this field
    pub fn default_value(&self) -> FeatureValue {
        match &self.kind {
            FieldKind::Integer { default, .. } => FeatureValue::Integer(*default),
            FieldKind::Float { default, .. } => FeatureValue::Float(*default),
            FieldKind::Choice { default, .. } => FeatureValue::Category(default.clone()),
        }
    }

    /// Check a submitted JSON value against this field
    pub fn parse(&self, value: &Value) -> Result<FeatureValue, FormError> {
        match &self.kind {
            FieldKind::Integer { min, max, .. } => {
                let v = value.as_i64().ok_or_else(|| self.wrong_type("an integer", value))?;
                if v < *min || v > *max {
                    return Err(self.out_of_range(v as f64, *min as f64, *max as f64));
                }
                Ok(FeatureValue::Integer(v))
            }
            FieldKind::Float { min, max, .. } => {
                let v = value.as_f64().ok_or_else(|| self.wrong_type("a number", value))?;
                if !v.is_finite() || v < *min || v > *max {
                    return Err(self.out_of_range(v, *min, *max));
                }
                Ok(FeatureValue::Float(v))
            }
            FieldKind::Choice { options, .. } => {
                let v = value.as_str().ok_or_else(|| self.wrong_type("a string", value))?;
                if !options.iter().any(|o| o == v) {
                    return Err(FormError::UnknownChoice {
                        field: self.name.clone(),
                        value: v.to_string(),
                    });
                }
                Ok(FeatureValue::Category(v.to_string()))
            }
        }
    }

    fn wrong_type(&self, expected: &'static str, actual: &Value) -> FormError {
        FormError::WrongType {
            field: self.name.clone(),
            expected,
            actual: actual.to_string(),
        }
    }

    fn out_of_range(&self, value: f64, min: f64, max: f64) -> FormError {
        FormError::OutOfRange {
            field: self.name.clone(),
            value,
            min,
            max,
        }
    }
}

/// Ordered set of form fields
#[derive(Debug, Clone, PartialEq)]
pub struct FormSpec {
    fields: Vec<FormField>,
}

impl FormSpec {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self { fields }
    }

    /// The sleep health and lifestyle assessment form
    pub fn sleep_assessment() -> Self {
        Self::new(vec![
            FormField::integer("Age", 18, 100, 30),
            FormField::choice("Gender", &["Male", "Female"]),
            FormField::choice(
                "Occupation",
                &[
                    "Doctor",
                    "Engineer",
                    "Sales Representative",
                    "Nurse",
                    "Teacher",
                    "Software Engineer",
                ],
            ),
            FormField::float("Sleep Duration", 3.0, 12.0, 6.0),
            FormField::integer("Stress Level", 1, 10, 5),
            FormField::integer("Physical Activity Level", 0, 100, 50),
            FormField::integer("Heart Rate", 40, 120, 75),
            FormField::integer("Daily Steps", 1000, 20000, 5000),
            FormField::choice("BMI Category", &["Normal", "Overweight", "Obese", "Underweight"]),
        ])
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Record holding every field's default value
    pub fn defaults(&self) -> RawInputRecord {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default_value()))
            .collect()
    }

    /// Turn a submission into a raw input record.
    ///
    /// Declared fields are checked, undeclared ones are copied through so the
    /// reconciler can report them.
    pub fn collect(&self, submission: &Map<String, Value>) -> Result<RawInputRecord, FormError> {
        let mut record = self.defaults();

        for (name, value) in submission {
            // null means "not filled in": declared fields keep their default,
            // undeclared ones stay absent
            if value.is_null() {
                continue;
            }
            let parsed = match self.field(name) {
                Some(field) => field.parse(value)?,
                None => match json_to_feature(name, value)? {
                    Some(v) => v,
                    None => continue,
                },
            };
            record.insert(name.clone(), parsed);
        }

        Ok(record)
    }
}

impl Default for FormSpec {
    fn default() -> Self {
        Self::sleep_assessment()
    }
}

/// Convert an arbitrary JSON scalar, without any field constraints.
///
/// `null` yields `None`: the field was not supplied.
pub fn json_to_feature(name: &str, value: &Value) -> Result<Option<FeatureValue>, FormError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(FeatureValue::Category(s.clone()))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(FeatureValue::Integer(i))),
            None => n
                .as_f64()
                .map(|f| Some(FeatureValue::Float(f)))
                .ok_or_else(|| FormError::Unsupported {
                    field: name.to_string(),
                    reason: format!("number {} is not representable", n),
                }),
        },
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Err(FormError::Unsupported {
            field: name.to_string(),
            reason: format!("expected a scalar, got {}", value),
        }),
    }
}

/// Convert a JSON object field by field, without any constraints
pub fn record_from_json(submission: &Map<String, Value>) -> Result<RawInputRecord, FormError> {
    submission
        .iter()
        .filter_map(|(name, value)| {
            json_to_feature(name, value)
                .transpose()
                .map(|parsed| parsed.map(|v| (name.clone(), v)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|pairs| pairs.into_iter().collect())
}

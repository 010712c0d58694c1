//! Schema reconciliation for classifier input.
//!
//! Aligns the fields a user submitted with the exact column order the model
//! was trained on. Reconciliation never fails: columns the user did not
//! supply become [`FeatureValue::Missing`], fields the model does not know
//! are dropped, and both are reported in [`Diagnostics`].

use crate::types::{FeatureSchema, FeatureValue, RawInputRecord, ReconciledRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Schema mismatches found during reconciliation.
///
/// `missing` and `extra` are disjoint and together make up the symmetric
/// difference between the submitted field names and the schema columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Schema columns with no submitted value, in schema order
    pub missing: Vec<String>,
    /// Submitted fields the schema does not contain, in name order
    pub extra: Vec<String>,
}

impl Diagnostics {
    /// No mismatches in either direction
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "input matches the model schema");
        }

        let mut parts = Vec::with_capacity(2);
        if !self.missing.is_empty() {
            parts.push(format!(
                "not provided (sent as missing): {}",
                self.missing.join(", ")
            ));
        }
        if !self.extra.is_empty() {
            parts.push(format!("ignored (unknown to the model): {}", self.extra.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Align a raw input record with the feature schema.
///
/// The resulting row has exactly the schema's columns in schema order.
/// Submitted values are copied as-is.
pub fn reconcile(raw: &RawInputRecord, schema: &FeatureSchema) -> (ReconciledRow, Diagnostics) {
    let mut missing = Vec::new();

    let cells: Vec<(String, FeatureValue)> = schema
        .columns()
        .iter()
        .map(|column| {
            let value = match raw.get(column) {
                Some(value) => value.clone(),
                None => {
                    missing.push(column.clone());
                    FeatureValue::Missing
                }
            };
            (column.clone(), value)
        })
        .collect();

    let extra: Vec<String> = raw
        .keys()
        .filter(|key| !schema.contains(key))
        .map(str::to_string)
        .collect();

    let diagnostics = Diagnostics { missing, extra };

    if diagnostics.is_clean() {
        debug!(columns = schema.len(), "Input reconciled with model schema");
    } else {
        warn!(
            missing = ?diagnostics.missing,
            extra = ?diagnostics.extra,
            "Input does not match model schema"
        );
    }

    (ReconciledRow::from_cells(cells), diagnostics)
}

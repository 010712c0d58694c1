//! ONNX Runtime classifier backend.
//!
//! Two input layouts are supported:
//! - per-column: one `[1, 1]` input per schema column, the usual export of a
//!   column-transformer pipeline (string, float or int64 typed);
//! - dense: a single float input holding every column in schema order, with
//!   categorical columns encoded through the sidecar's encoding tables.
//!
//! Probabilities are read from either a `[1, n_classes]` float tensor or a
//! `seq(map(key, float))` output (the ZipMap form).

use crate::models::classifier::{Classifier, ClassifierHandle, ProbabilisticClassifier};
use crate::models::loader::ModelBackend;
use crate::types::schema::CategoricalEncodings;
use crate::types::{FeatureSchema, FeatureValue, ReconciledRow, SchemaSidecar};
use anyhow::{anyhow, bail, Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::tensor::TensorElementType;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor, ValueType};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Values written into the model for columns the user did not supply
#[derive(Debug, Clone)]
pub struct MissingSentinel {
    /// Used for float inputs (and int64 inputs when integral)
    pub numeric: f64,
    /// Used for string inputs
    pub category: String,
}

impl Default for MissingSentinel {
    fn default() -> Self {
        Self {
            numeric: f64::NAN,
            category: String::new(),
        }
    }
}

/// Element type of a per-column model input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Float32,
    Float64,
    Int64,
}

impl ColumnType {
    fn from_element_type(ty: TensorElementType) -> Option<Self> {
        match ty {
            TensorElementType::String => Some(ColumnType::String),
            TensorElementType::Float32 => Some(ColumnType::Float32),
            TensorElementType::Float64 => Some(ColumnType::Float64),
            TensorElementType::Int64 => Some(ColumnType::Int64),
            _ => None,
        }
    }
}

/// Name, element type and feature width of a model input
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub name: String,
    pub ty: Option<ColumnType>,
    /// Last dimension, when the graph fixes it
    pub width: Option<usize>,
}

/// How reconciled rows are fed to the graph
#[derive(Debug, Clone, PartialEq)]
pub enum InputLayout {
    /// One input per schema column, in schema order
    PerColumn(Vec<(String, ColumnType)>),
    /// One float input of width `len(schema)`
    Dense { input_name: String },
}

impl InputLayout {
    /// Match the graph's inputs against the feature schema
    pub fn resolve(inputs: &[ModelInput], schema: &FeatureSchema) -> Result<Self> {
        let names_match = !schema.is_empty()
            && inputs.len() == schema.len()
            && inputs.iter().all(|input| schema.contains(&input.name));

        if names_match {
            let columns = schema
                .columns()
                .iter()
                .map(|column| -> Result<(String, ColumnType)> {
                    let input = inputs
                        .iter()
                        .find(|input| &input.name == column)
                        .ok_or_else(|| anyhow!("model has no input for column '{}'", column))?;
                    let ty = input
                        .ty
                        .ok_or_else(|| anyhow!("model input '{}' has an unsupported type", column))?;
                    Ok((column.clone(), ty))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(InputLayout::PerColumn(columns));
        }

        match inputs {
            [single] if single.ty == Some(ColumnType::Float32) => match single.width {
                Some(width) if width != schema.len() => bail!(
                    "model input '{}' takes {} features but the schema has {} columns",
                    single.name,
                    width,
                    schema.len()
                ),
                _ => Ok(InputLayout::Dense {
                    input_name: single.name.clone(),
                }),
            },
            _ => {
                let names: Vec<&str> = inputs.iter().map(|i| i.name.as_str()).collect();
                bail!(
                    "model inputs {:?} match neither the feature schema nor a single float input",
                    names
                )
            }
        }
    }
}

/// A single scalar ready to be placed in a `[1, 1]` tensor
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Str(String),
    F32(f32),
    F64(f64),
    I64(i64),
}

fn encode_scalar(
    column: &str,
    value: &FeatureValue,
    ty: ColumnType,
    sentinel: &MissingSentinel,
) -> Result<Scalar> {
    match (ty, value) {
        (ColumnType::String, FeatureValue::Category(v)) => Ok(Scalar::Str(v.clone())),
        (ColumnType::String, FeatureValue::Missing) => Ok(Scalar::Str(sentinel.category.clone())),
        (ColumnType::String, other) => {
            bail!("column '{}' expects a category, got {}", column, other)
        }

        (ColumnType::Float32, FeatureValue::Missing) => Ok(Scalar::F32(sentinel.numeric as f32)),
        (ColumnType::Float64, FeatureValue::Missing) => Ok(Scalar::F64(sentinel.numeric)),
        (ColumnType::Float32 | ColumnType::Float64, FeatureValue::Category(v)) => {
            bail!("column '{}' expects a number, got category '{}'", column, v)
        }
        (ColumnType::Float32, numeric) => Ok(Scalar::F32(numeric.as_f64().unwrap_or_default() as f32)),
        (ColumnType::Float64, numeric) => Ok(Scalar::F64(numeric.as_f64().unwrap_or_default())),

        (ColumnType::Int64, FeatureValue::Integer(v)) => Ok(Scalar::I64(*v)),
        (ColumnType::Int64, FeatureValue::Float(v)) if v.fract() == 0.0 => Ok(Scalar::I64(*v as i64)),
        (ColumnType::Int64, FeatureValue::Missing)
            if sentinel.numeric.is_finite() && sentinel.numeric.fract() == 0.0 =>
        {
            Ok(Scalar::I64(sentinel.numeric as i64))
        }
        (ColumnType::Int64, FeatureValue::Missing) => bail!(
            "column '{}' is an integer input and the missing sentinel {} is not an integer",
            column,
            sentinel.numeric
        ),
        (ColumnType::Int64, other) => {
            bail!("column '{}' expects an integer, got {}", column, other)
        }
    }
}

/// Flatten a row into the dense float layout
fn encode_dense(
    row: &ReconciledRow,
    encodings: &CategoricalEncodings,
    sentinel: &MissingSentinel,
) -> Result<Vec<f32>> {
    row.iter()
        .map(|(column, value)| -> Result<f32> {
            match value {
                FeatureValue::Integer(v) => Ok(*v as f32),
                FeatureValue::Float(v) => Ok(*v as f32),
                FeatureValue::Missing => Ok(sentinel.numeric as f32),
                FeatureValue::Category(category) => {
                    let table = encodings.get(column).ok_or_else(|| {
                        anyhow!("column '{}' is categorical but has no encoding", column)
                    })?;
                    table.get(category).copied().ok_or_else(|| {
                        anyhow!("unseen category '{}' for column '{}'", category, column)
                    })
                }
            }
        })
        .collect()
}

/// Class identifier as it appears in a probability map
#[derive(Debug, Clone, PartialEq)]
enum ClassKey {
    Index(i64),
    Label(String),
}

/// Order `(class, probability)` pairs by the known class labels
fn align_probabilities(pairs: Vec<(ClassKey, f64)>, class_labels: &[String]) -> Result<Vec<f64>> {
    if pairs.len() != class_labels.len() {
        bail!(
            "model reported {} class probabilities but {} class labels are known",
            pairs.len(),
            class_labels.len()
        );
    }

    let mut aligned: Vec<Option<f64>> = vec![None; class_labels.len()];
    for (key, probability) in pairs {
        let position = match &key {
            ClassKey::Index(i) => usize::try_from(*i).ok().filter(|&i| i < class_labels.len()),
            ClassKey::Label(label) => class_labels.iter().position(|l| l == label),
        };
        let position = position.ok_or_else(|| anyhow!("unknown class {:?} in model output", key))?;
        if aligned[position].replace(probability).is_some() {
            bail!("class {:?} appears more than once in model output", key);
        }
    }
    // n distinct positions out of n, so every slot is filled
    Ok(aligned.into_iter().flatten().collect())
}

/// Take the write lock even if a caught panic poisoned it; a session holds
/// no state between runs.
fn write_recovering<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    /// Session run needs exclusive access
    session: RwLock<Session>,
    layout: InputLayout,
    label_output: String,
    probability_output: Option<String>,
    class_labels: Vec<String>,
    encodings: CategoricalEncodings,
    sentinel: MissingSentinel,
}

impl OnnxClassifier {
    /// Model input layout resolved at load time
    pub fn layout(&self) -> &InputLayout {
        &self.layout
    }

    fn build_inputs(&self, row: &ReconciledRow) -> Result<Vec<(String, DynValue)>> {
        match &self.layout {
            InputLayout::Dense { input_name } => {
                let features = encode_dense(row, &self.encodings, &self.sentinel)?;
                let shape = vec![1_i64, features.len() as i64];
                let tensor = Tensor::from_array((shape, features))
                    .context("Failed to create input tensor")?;
                Ok(vec![(input_name.clone(), tensor.into_dyn())])
            }
            InputLayout::PerColumn(columns) => columns
                .iter()
                .map(|(column, ty)| -> Result<(String, DynValue)> {
                    let value = row
                        .get(column)
                        .ok_or_else(|| anyhow!("row has no value for column '{}'", column))?;
                    let shape = vec![1_i64, 1];
                    let tensor = match encode_scalar(column, value, *ty, &self.sentinel)? {
                        Scalar::Str(v) => Tensor::from_string_array((shape, &[v][..]))?.into_dyn(),
                        Scalar::F32(v) => Tensor::from_array((shape, vec![v]))?.into_dyn(),
                        Scalar::F64(v) => Tensor::from_array((shape, vec![v]))?.into_dyn(),
                        Scalar::I64(v) => Tensor::from_array((shape, vec![v]))?.into_dyn(),
                    };
                    Ok((column.clone(), tensor))
                })
                .collect(),
        }
    }

    fn extract_label(&self, outputs: &SessionOutputs) -> Result<String> {
        let output = outputs
            .get(self.label_output.as_str())
            .ok_or_else(|| anyhow!("model produced no '{}' output", self.label_output))?;

        if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
            let class = *data.first().ok_or_else(|| anyhow!("empty label output"))?;
            return Ok(usize::try_from(class)
                .ok()
                .and_then(|i| self.class_labels.get(i).cloned())
                .unwrap_or_else(|| class.to_string()));
        }

        if let Ok((_, labels)) = output.try_extract_strings() {
            return labels
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("empty label output"));
        }

        bail!("label output '{}' is neither int64 nor string", self.label_output)
    }

    fn extract_probabilities(&self, outputs: &SessionOutputs, output_name: &str) -> Result<Vec<f64>> {
        let output = outputs
            .get(output_name)
            .ok_or_else(|| anyhow!("model produced no '{}' output", output_name))?;

        // [1, n_classes] tensor
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            if data.len() != self.class_labels.len() {
                bail!(
                    "model reported {} class probabilities but {} class labels are known",
                    data.len(),
                    self.class_labels.len()
                );
            }
            return Ok(data.iter().map(|&p| p as f64).collect());
        }

        // seq(map(int64 | string, float)), one map per row
        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            let allocator = Allocator::default();
            let sequence = output
                .downcast_ref::<DynSequenceValueType>()
                .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
            let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
            let map_value = maps.first().ok_or_else(|| anyhow!("Empty sequence"))?;

            let pairs: Vec<(ClassKey, f64)> = match map_value.try_extract_key_values::<i64, f32>() {
                Ok(kv) => kv
                    .into_iter()
                    .map(|(k, v)| (ClassKey::Index(k), v as f64))
                    .collect(),
                Err(_) => map_value
                    .try_extract_key_values::<String, f32>()?
                    .into_iter()
                    .map(|(k, v)| (ClassKey::Label(k), v as f64))
                    .collect(),
            };
            return align_probabilities(pairs, &self.class_labels);
        }

        bail!("probability output '{}' has an unsupported type", output_name)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, row: &ReconciledRow) -> Result<String> {
        let inputs = self.build_inputs(row)?;
        let mut session = write_recovering(&self.session);
        let outputs = session.run(inputs)?;
        self.extract_label(&outputs)
    }
}

impl ProbabilisticClassifier for OnnxClassifier {
    fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    fn predict_probabilities(&self, row: &ReconciledRow) -> Result<Vec<f64>> {
        self.predict_with_probabilities(row)
            .map(|(_, probabilities)| probabilities)
    }

    /// Label and distribution from a single session run
    fn predict_with_probabilities(&self, row: &ReconciledRow) -> Result<(String, Vec<f64>)> {
        let output_name = self
            .probability_output
            .as_deref()
            .ok_or_else(|| anyhow!("model has no probability output"))?;
        let inputs = self.build_inputs(row)?;
        let mut session = write_recovering(&self.session);
        let outputs = session.run(inputs)?;
        let label = self.extract_label(&outputs)?;
        let probabilities = self.extract_probabilities(&outputs, output_name)?;
        Ok((label, probabilities))
    }
}

/// Loads `.onnx` model files with ONNX Runtime
pub struct OnnxBackend {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    sentinel: MissingSentinel,
}

impl OnnxBackend {
    /// Initialize ONNX Runtime and create a backend
    pub fn new(onnx_threads: usize, sentinel: MissingSentinel) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self {
            onnx_threads,
            sentinel,
        })
    }
}

impl ModelBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn load_classifier(&self, path: &Path, sidecar: &SchemaSidecar) -> Result<ClassifierHandle> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let inputs: Vec<ModelInput> = session
            .inputs
            .iter()
            .map(|input| match &input.input_type {
                ValueType::Tensor { ty, shape, .. } => ModelInput {
                    name: input.name.clone(),
                    ty: ColumnType::from_element_type(*ty),
                    // -1 marks a dynamic dimension
                    width: shape
                        .iter()
                        .last()
                        .and_then(|&d| usize::try_from(d).ok())
                        .filter(|&d| d > 0),
                },
                _ => ModelInput {
                    name: input.name.clone(),
                    ty: None,
                    width: None,
                },
            })
            .collect();
        let layout = InputLayout::resolve(&inputs, &sidecar.schema)?;

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow!("model has no outputs"))?;

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name != label_output && o.name.contains("prob"))
            .map(|o| o.name.clone());

        info!(
            layout = ?layout,
            label_output = %label_output,
            probability_output = ?probability_output,
            "ONNX model loaded"
        );

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        let has_probabilities = probability_output.is_some();
        let classifier = OnnxClassifier {
            name,
            session: RwLock::new(session),
            layout,
            label_output,
            probability_output,
            class_labels: sidecar.class_labels.clone(),
            encodings: sidecar.categorical_encodings.clone(),
            sentinel: self.sentinel.clone(),
        };

        match (has_probabilities, classifier.class_labels.is_empty()) {
            (true, false) => Ok(ClassifierHandle::probabilistic(classifier)),
            (true, true) => {
                warn!("Model has a probability output but no class labels are known; probabilities disabled");
                Ok(ClassifierHandle::basic(classifier))
            }
            _ => {
                debug!("Model has no probability output");
                Ok(ClassifierHandle::basic(classifier))
            }
        }
    }
}

//! Configuration management for the sleep disorder classifier

use crate::models::MissingSentinel;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject assessment submissions arrive on
    pub request_subject: String,
    /// Subject for responses to submissions that carry no reply inbox
    pub response_subject: String,
}

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Path to the feature schema sidecar (JSON)
    pub schema_path: PathBuf,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// How missing columns are materialised for the model
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Numeric placeholder for absent columns (default: NaN)
    #[serde(default = "default_numeric_sentinel")]
    pub numeric_sentinel: f64,
    /// Category placeholder for absent columns (default: empty string)
    #[serde(default)]
    pub category_sentinel: String,
}

fn default_numeric_sentinel() -> f64 {
    f64::NAN
}

impl InferenceConfig {
    pub fn sentinel(&self) -> MissingSentinel {
        MissingSentinel {
            numeric: self.numeric_sentinel,
            category: self.category_sentinel.clone(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            numeric_sentinel: default_numeric_sentinel(),
            category_sentinel: String::new(),
        }
    }
}

/// Collection-layer settings
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    /// Check submitted fields against the assessment form before reconciling
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

fn default_enforce() -> bool {
    true
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            enforce: default_enforce(),
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summary log lines
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_report_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "sleep.assessments".to_string(),
                response_subject: "sleep.predictions".to_string(),
            },
            artifacts: ArtifactsConfig {
                model_path: PathBuf::from("models/sleep_disorder_pipeline.onnx"),
                schema_path: PathBuf::from("models/feature_info.json"),
                onnx_threads: default_onnx_threads(),
            },
            inference: InferenceConfig::default(),
            form: FormConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

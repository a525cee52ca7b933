//! Configuration types for a Baton pipeline run.
//!
//! Uses `figment` for layered configuration: defaults -> TOML file ->
//! `BATON_`-prefixed environment variables. A `PipelineConfig` is resolved
//! once before a run starts and is read-only thereafter; every recognized
//! option is enumerated here, with no runtime-discovered keys.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ingestion stage configuration.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Dataset validation configuration.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Feature transformation configuration.
    #[serde(default)]
    pub transform: TransformConfig,
    /// Model training configuration.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Challenger evaluation configuration.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Model registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Artifact storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl PipelineConfig {
    /// Load configuration: defaults, then an optional TOML file, then
    /// `BATON_`-prefixed environment overrides (`BATON_INGESTION__SEED=7`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
            tracing::debug!(path = %path.display(), "merged configuration file");
        }
        figment = figment.merge(Env::prefixed("BATON_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.ingestion.split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::invalid(format!(
                "ingestion.split_ratio must be in (0, 1), got {ratio}"
            )));
        }
        if self.validation.drift_threshold <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "validation.drift_threshold must be positive, got {}",
                self.validation.drift_threshold
            )));
        }
        if self.evaluation.acceptance_threshold < 0.0 {
            return Err(ConfigError::invalid(format!(
                "evaluation.acceptance_threshold must be non-negative, got {}",
                self.evaluation.acceptance_threshold
            )));
        }
        if self.transform.label_column.is_empty() {
            return Err(ConfigError::invalid("transform.label_column must be set"));
        }
        if self.registry.slot.is_empty() {
            return Err(ConfigError::invalid("registry.slot must be set"));
        }
        Ok(())
    }
}

/// Where raw records are pulled from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Csv {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    Jsonl {
        path: PathBuf,
    },
}

fn default_delimiter() -> char {
    ','
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Jsonl {
            path: PathBuf::from("data/records.jsonl"),
        }
    }
}

/// Ingestion stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Record source to ingest from.
    #[serde(default)]
    pub source: SourceConfig,
    /// Fraction of rows assigned to the train partition, in (0, 1).
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    /// Seed for the deterministic pre-split shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            split_ratio: default_split_ratio(),
            seed: default_seed(),
        }
    }
}

fn default_split_ratio() -> f64 {
    0.8
}

fn default_seed() -> u64 {
    42
}

/// Dataset validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Path to the declared table schema (TOML).
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Per-column PSI above which the train/test split is considered drifted.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    /// Accept columns not declared in the schema.
    #[serde(default)]
    pub allow_extra_columns: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema_path: default_schema_path(),
            drift_threshold: default_drift_threshold(),
            allow_extra_columns: false,
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("schema.toml")
}

fn default_drift_threshold() -> f64 {
    0.2
}

/// How numeric features are scaled after imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    ZScore,
    MinMax,
}

/// How missing numeric values are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    Median,
    Mean,
}

/// Feature transformation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Column holding the 0/1 classification target.
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Scaling applied to numeric feature columns.
    #[serde(default = "default_scaling")]
    pub scaling: ScalingMethod,
    /// Fill strategy for missing numeric values.
    #[serde(default = "default_imputation")]
    pub imputation: ImputationStrategy,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            label_column: default_label_column(),
            scaling: default_scaling(),
            imputation: default_imputation(),
        }
    }
}

fn default_label_column() -> String {
    "label".to_string()
}

fn default_scaling() -> ScalingMethod {
    ScalingMethod::ZScore
}

fn default_imputation() -> ImputationStrategy {
    ImputationStrategy::Median
}

/// Estimator choice with its hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorConfig {
    Logistic {
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_epochs")]
        epochs: usize,
        #[serde(default)]
        l2: f64,
    },
    DecisionTree {
        #[serde(default = "default_max_depth")]
        max_depth: usize,
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
    },
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::Logistic {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: 0.0,
        }
    }
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> usize {
    200
}

fn default_max_depth() -> usize {
    6
}

fn default_min_samples_split() -> usize {
    4
}

/// Model training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Estimator and its hyperparameters.
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Seed for stochastic estimator initialization.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            seed: default_seed(),
        }
    }
}

/// Challenger evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Minimum metric improvement over the champion required for promotion.
    /// A challenger is accepted only when `challenger - champion` is
    /// strictly greater than this value.
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
        }
    }
}

fn default_acceptance_threshold() -> f64 {
    0.02
}

/// Model registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Logical name of the single champion slot.
    #[serde(default = "default_slot")]
    pub slot: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            slot: default_slot(),
        }
    }
}

fn default_slot() -> String {
    "champion".to_string()
}

/// Artifact storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local object store.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".baton/artifacts")
}

//! Error types for the baton-ml crate.
//!
//! One variant per failure class in the pipeline; no stage swallows an
//! error and continues, so a single `PipelineError` always describes why
//! a whole run terminated.

use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Data drift detected: {0}")]
    DataDrift(String),

    #[error("Transformation error: {0}")]
    Transformation(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Registry integrity error: {0}")]
    RegistryIntegrity(String),

    #[error("Push error: {0}")]
    Push(String),

    #[error("Configuration error: {0}")]
    Config(#[from] baton_core::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] baton_core::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn ingestion(msg: impl Into<String>) -> Self {
        Self::Ingestion(msg.into())
    }

    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    pub fn data_drift(msg: impl Into<String>) -> Self {
        Self::DataDrift(msg.into())
    }

    pub fn transformation(msg: impl Into<String>) -> Self {
        Self::Transformation(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn registry_integrity(msg: impl Into<String>) -> Self {
        Self::RegistryIntegrity(msg.into())
    }

    pub fn push(msg: impl Into<String>) -> Self {
        Self::Push(msg.into())
    }

    /// Short machine-readable kind, attached to failed run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ingestion(_) => "ingestion",
            Self::SchemaViolation(_) => "schema_violation",
            Self::DataDrift(_) => "data_drift",
            Self::Transformation(_) => "transformation",
            Self::Training(_) => "training",
            Self::Evaluation(_) => "evaluation",
            Self::RegistryIntegrity(_) => "registry_integrity",
            Self::Push(_) => "push",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::Serde(_) => "serde",
        }
    }
}

//! Dataset validation: schema conformance plus train/test drift.
//!
//! Runs after ingestion and before transformation. A dirty report halts
//! the run; downstream stages never see unvalidated data.

use crate::data::batch::RecordBatch;
use crate::data::drift::{self, ColumnDrift};
use crate::data::ingest::DatasetArtifact;
use crate::data::schema::{TableSchema, Violation};
use crate::error::PipelineError;
use baton_core::config::ValidationConfig;
use baton_core::storage::{ObjectStore, get_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of validating one ingested dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub violations: Vec<Violation>,
    pub drift: Vec<ColumnDrift>,
    pub rows_checked: usize,
    pub checked_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn drifted_columns(&self) -> impl Iterator<Item = &ColumnDrift> {
        self.drift.iter().filter(|d| d.drifted)
    }

    /// Convert a dirty report into the error that halts the run.
    /// Schema violations take precedence over drift.
    pub fn ensure_clean(&self) -> Result<(), PipelineError> {
        if !self.violations.is_empty() {
            let summary: Vec<String> = self.violations.iter().take(5).map(|v| v.to_string()).collect();
            return Err(PipelineError::schema_violation(format!(
                "{} violation(s): {}",
                self.violations.len(),
                summary.join("; ")
            )));
        }
        let drifted: Vec<String> = self
            .drifted_columns()
            .map(|d| format!("{} (psi {:.3})", d.column, d.psi))
            .collect();
        if !drifted.is_empty() {
            return Err(PipelineError::data_drift(format!(
                "train/test distributions diverged: {}",
                drifted.join(", ")
            )));
        }
        Ok(())
    }
}

/// The validation stage.
pub struct DatasetValidator {
    store: Arc<dyn ObjectStore>,
}

impl DatasetValidator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Reload both partitions, schema-check the full dataset, and measure
    /// per-column drift between train and test.
    pub async fn validate(
        &self,
        artifact: &DatasetArtifact,
        schema: &TableSchema,
        config: &ValidationConfig,
    ) -> Result<ValidationReport, PipelineError> {
        let train: RecordBatch = get_json(self.store.as_ref(), &artifact.train_key).await?;
        let test: RecordBatch = get_json(self.store.as_ref(), &artifact.test_key).await?;

        let full = train.vstack(&test).ok_or_else(|| {
            PipelineError::schema_violation("train and test partitions have mismatched columns")
        })?;

        let violations = schema.check_batch(&full, config.allow_extra_columns);
        let drift = drift::detect(&train, &test, schema, config.drift_threshold);

        let passed = violations.is_empty() && !drift.iter().any(|d| d.drifted);
        let report = ValidationReport {
            passed,
            violations,
            drift,
            rows_checked: full.row_count(),
            checked_at: Utc::now(),
        };

        if report.passed {
            tracing::info!(rows = report.rows_checked, "dataset validation passed");
        } else {
            tracing::warn!(
                violations = report.violations.len(),
                drifted = report.drifted_columns().count(),
                "dataset validation failed"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ingest::Ingestor;
    use crate::data::source::MemorySource;
    use baton_core::LocalStore;

    fn schema() -> TableSchema {
        TableSchema::from_toml_str(
            r#"
[[columns]]
name = "age"
kind = "integer"
min = 18
max = 100

[[columns]]
name = "label"
kind = "integer"
min = 0
max = 1
"#,
        )
        .unwrap()
    }

    fn batch_of(ages: impl Iterator<Item = i64>) -> RecordBatch {
        RecordBatch::new(
            vec!["age".into(), "label".into()],
            ages.map(|age| vec![serde_json::json!(age), serde_json::json!(age % 2)])
                .collect(),
        )
    }

    async fn validated(batch: RecordBatch, config: &ValidationConfig) -> ValidationReport {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store.clone());
        let source = MemorySource::new(batch);
        let artifact = ingestor.ingest(&source, 0.8, 42, "run-1").await.unwrap();
        DatasetValidator::new(store)
            .validate(&artifact, &schema(), config)
            .await
            .unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = ValidationConfig::default();
        assert!(config.drift_threshold > 0.0);
    }

    /// Small test partitions carry PSI binning noise, so the clean-path
    /// tests use a threshold only a genuine shift would clear.
    fn tolerant() -> ValidationConfig {
        ValidationConfig {
            drift_threshold: 5.0,
            ..ValidationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_clean_dataset_passes() {
        let report = validated(batch_of(18..98), &tolerant()).await;
        assert!(report.passed);
        assert!(report.violations.is_empty());
        assert!(report.ensure_clean().is_ok());
    }

    #[tokio::test]
    async fn test_schema_violations_fail_the_report() {
        // ages below the declared minimum
        let report = validated(batch_of(1..81), &tolerant()).await;
        assert!(!report.passed);
        assert!(!report.violations.is_empty());
        let err = report.ensure_clean().unwrap_err();
        assert!(matches!(err, PipelineError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_tight_threshold_reports_drift() {
        // A random 80/20 split of a uniform range always shows some PSI;
        // an absurdly tight threshold must flag it and halt as drift.
        let config = ValidationConfig {
            drift_threshold: 1e-6,
            ..ValidationConfig::default()
        };
        let report = validated(batch_of(18..98), &config).await;
        assert!(!report.passed);
        assert!(report.violations.is_empty());
        let err = report.ensure_clean().unwrap_err();
        assert!(matches!(err, PipelineError::DataDrift(_)));
    }
}

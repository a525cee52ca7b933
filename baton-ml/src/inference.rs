//! Serving: predictions from the currently registered champion.

use crate::data::batch::RecordBatch;
use crate::error::PipelineError;
use crate::features::FittedTransformer;
use crate::model::FittedModel;
use crate::registry::{ModelRegistry, RegistryRecord};

/// A loaded champion pair ready to serve predictions. The transformer's
/// fitted encoding is applied before inference, so serving reproduces the
/// training-time feature encoding exactly.
#[derive(Debug)]
pub struct Predictor {
    model: FittedModel,
    transformer: FittedTransformer,
    record: RegistryRecord,
}

impl Predictor {
    /// Load the champion model and transformer from the registry slot.
    pub async fn load(registry: &ModelRegistry) -> Result<Self, PipelineError> {
        let record = registry.current().await?.ok_or_else(|| {
            PipelineError::registry_integrity("registry slot is empty; no champion to serve")
        })?;
        let (model, transformer) = registry.load_champion(&record).await?;
        tracing::info!(
            version = record.version,
            kind = model.kind(),
            "loaded champion for serving"
        );
        Ok(Self {
            model,
            transformer,
            record,
        })
    }

    /// The registry record this predictor was loaded from.
    pub fn record(&self) -> &RegistryRecord {
        &self.record
    }

    /// Positive-class probability per record.
    pub fn predict(&self, batch: &RecordBatch) -> Result<Vec<f64>, PipelineError> {
        let features = self.transformer.encode(batch)?;
        self.model.predict(&features)
    }

    /// Hard 0/1 labels per record, thresholded at 0.5.
    pub fn predict_labels(&self, batch: &RecordBatch) -> Result<Vec<u8>, PipelineError> {
        Ok(self
            .predict(batch)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::TableSchema;
    use crate::model::{Estimator, LogisticRegression};
    use crate::registry::RegistryRecord;
    use baton_core::config::TransformConfig;
    use baton_core::storage::{LocalStore, ObjectStore, put_json};
    use chrono::Utc;
    use std::sync::Arc;

    fn schema() -> TableSchema {
        TableSchema::from_toml_str(
            r#"
[[columns]]
name = "x"
kind = "float"

[[columns]]
name = "label"
kind = "integer"
min = 0
max = 1
"#,
        )
        .unwrap()
    }

    fn train_batch() -> RecordBatch {
        RecordBatch::new(
            vec!["x".into(), "label".into()],
            (0..40)
                .map(|i| {
                    let x = if i % 2 == 0 { -1.0 } else { 1.0 };
                    vec![serde_json::json!(x), serde_json::json!(i % 2)]
                })
                .collect(),
        )
    }

    async fn seeded_registry(store: Arc<dyn ObjectStore>) -> ModelRegistry {
        let transformer =
            FittedTransformer::fit(&train_batch(), &schema(), &TransformConfig::default()).unwrap();
        let encoded = transformer.transform(&train_batch()).unwrap();

        let mut model = LogisticRegression::new(0.5, 200, 0.0, 42);
        model.fit(&encoded.features, &encoded.labels).unwrap();

        put_json(store.as_ref(), "runs/r/model/model.json", &model.snapshot())
            .await
            .unwrap();
        put_json(store.as_ref(), "runs/r/model/transformer.json", &transformer)
            .await
            .unwrap();

        let registry = ModelRegistry::new(store, "champion");
        registry
            .promote(
                0,
                RegistryRecord {
                    version: 0,
                    run_id: "r".into(),
                    model_key: "runs/r/model/model.json".into(),
                    transformer_key: "runs/r/model/transformer.json".into(),
                    model_hash: "x".into(),
                    metric: 1.0,
                    promoted_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_predict_applies_fitted_encoding() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let registry = seeded_registry(store).await;

        let predictor = Predictor::load(&registry).await.unwrap();
        // Serving input has no label column.
        let batch = RecordBatch::new(
            vec!["x".into()],
            vec![
                vec![serde_json::json!(-1.0)],
                vec![serde_json::json!(1.0)],
            ],
        );
        let labels = predictor.predict_labels(&batch).unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_empty_registry_cannot_serve() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let registry = ModelRegistry::new(store, "champion");

        let err = Predictor::load(&registry).await.unwrap_err();
        assert!(matches!(err, PipelineError::RegistryIntegrity(_)));
    }
}

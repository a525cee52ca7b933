//! Single-slot champion registry.
//!
//! The registry record is the only persistent cross-run mutable state.
//! All mutation goes through `promote`, which holds the registry lock and
//! compares the record's version stamp before swapping, so two concurrent
//! accepted pushes cannot interleave such that an older challenger
//! overwrites a newer one after a check against a stale champion.

use crate::error::PipelineError;
use crate::features::FittedTransformer;
use crate::model::FittedModel;
use baton_core::StorageError;
use baton_core::storage::{ObjectStore, get_json, put_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The champion pointer stored in the registry slot. The model and
/// transformer it references are immutable objects under the promoting
/// run's key prefix, so the record swap is the atomic commit point: the
/// slot always references a complete, matching pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Monotonic version stamp; compare-and-swap target.
    pub version: u64,
    pub run_id: String,
    pub model_key: String,
    pub transformer_key: String,
    pub model_hash: String,
    /// Held-out test metric at promotion time.
    pub metric: f64,
    pub promoted_at: DateTime<Utc>,
}

/// Storage-backed registry with one logical slot.
pub struct ModelRegistry {
    store: Arc<dyn ObjectStore>,
    slot: String,
    lock: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ObjectStore>, slot: impl Into<String>) -> Self {
        Self {
            store,
            slot: slot.into(),
            lock: Mutex::new(()),
        }
    }

    fn record_key(&self) -> String {
        format!("registry/{}/record.json", self.slot)
    }

    /// The current champion record, or `None` on a fresh registry.
    pub async fn current(&self) -> Result<Option<RegistryRecord>, PipelineError> {
        match get_json::<RegistryRecord>(self.store.as_ref(), &self.record_key()).await {
            Ok(record) => Ok(Some(record)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the champion pair the record points at.
    ///
    /// A record that references missing objects is registry corruption,
    /// not a first-run state.
    pub async fn load_champion(
        &self,
        record: &RegistryRecord,
    ) -> Result<(FittedModel, FittedTransformer), PipelineError> {
        let model = self.fetch(&record.model_key, "model").await?;
        let transformer = self.fetch(&record.transformer_key, "transformer").await?;
        Ok((model, transformer))
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        what: &str,
    ) -> Result<T, PipelineError> {
        match get_json::<T>(self.store.as_ref(), key).await {
            Ok(value) => Ok(value),
            Err(StorageError::NotFound(_)) => Err(PipelineError::registry_integrity(format!(
                "registry slot '{}' references a missing {what} object: {key}",
                self.slot
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Swap the slot to `candidate` if the current version still matches
    /// `expected_version` (0 for an empty slot). Both referenced objects
    /// must already be durable.
    pub async fn promote(
        &self,
        expected_version: u64,
        candidate: RegistryRecord,
    ) -> Result<RegistryRecord, PipelineError> {
        let _guard = self.lock.lock().await;

        let current_version = self.current().await?.map(|r| r.version).unwrap_or(0);
        if current_version != expected_version {
            return Err(PipelineError::push(format!(
                "registry slot '{}' changed during the run: expected version {expected_version}, found {current_version}",
                self.slot
            )));
        }

        for (key, what) in [
            (&candidate.model_key, "model"),
            (&candidate.transformer_key, "transformer"),
        ] {
            if !self.store.exists(key).await? {
                return Err(PipelineError::push(format!(
                    "refusing to promote: {what} object missing at {key}"
                )));
            }
        }

        let record = RegistryRecord {
            version: current_version + 1,
            ..candidate
        };
        put_json(self.store.as_ref(), &self.record_key(), &record)
            .await
            .map_err(|e| PipelineError::push(format!("registry record write failed: {e}")))?;

        tracing::info!(
            slot = %self.slot,
            version = record.version,
            metric = record.metric,
            "promoted challenger to champion"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionTree, Estimator};
    use baton_core::LocalStore;

    fn record(version: u64, run: &str) -> RegistryRecord {
        RegistryRecord {
            version,
            run_id: run.to_string(),
            model_key: format!("runs/{run}/model/model.json"),
            transformer_key: format!("runs/{run}/model/transformer.json"),
            model_hash: "deadbeef".into(),
            metric: 0.9,
            promoted_at: Utc::now(),
        }
    }

    async fn store_pair(store: &dyn ObjectStore, run: &str) {
        let mut tree = DecisionTree::new(1, 2);
        tree.fit(&[vec![0.0], vec![1.0]], &[0.0, 1.0]).unwrap();
        let model = tree.snapshot();
        let transformer = FittedTransformer {
            label_column: "label".into(),
            columns: Vec::new(),
        };
        put_json(store, &format!("runs/{run}/model/model.json"), &model)
            .await
            .unwrap();
        put_json(
            store,
            &format!("runs/{run}/model/transformer.json"),
            &transformer,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_registry_has_no_champion() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let registry = ModelRegistry::new(store, "champion");
        assert!(registry.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promote_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        store_pair(store.as_ref(), "run-1").await;

        let registry = ModelRegistry::new(store, "champion");
        let promoted = registry.promote(0, record(0, "run-1")).await.unwrap();
        assert_eq!(promoted.version, 1);

        let current = registry.current().await.unwrap().unwrap();
        assert_eq!(current, promoted);
        registry.load_champion(&current).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        store_pair(store.as_ref(), "run-1").await;
        store_pair(store.as_ref(), "run-2").await;

        let registry = ModelRegistry::new(store, "champion");
        registry.promote(0, record(0, "run-1")).await.unwrap();

        // A second push that evaluated against the empty slot must fail.
        let err = registry.promote(0, record(0, "run-2")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Push(_)));

        // The first champion is still authoritative.
        let current = registry.current().await.unwrap().unwrap();
        assert_eq!(current.run_id, "run-1");
    }

    #[tokio::test]
    async fn test_promote_refuses_missing_artifacts() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let registry = ModelRegistry::new(store, "champion");

        let err = registry.promote(0, record(0, "run-1")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Push(_)));
        assert!(registry.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_champion_object_is_integrity_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        store_pair(store.as_ref(), "run-1").await;

        let registry = ModelRegistry::new(store.clone(), "champion");
        let promoted = registry.promote(0, record(0, "run-1")).await.unwrap();

        // Simulate corruption: the record survives but the model bytes vanish.
        let doctored = RegistryRecord {
            model_key: "runs/run-1/model/gone.json".into(),
            ..promoted
        };
        let err = registry.load_champion(&doctored).await.unwrap_err();
        assert!(matches!(err, PipelineError::RegistryIntegrity(_)));
    }
}

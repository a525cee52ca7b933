//! Push: upload the accepted challenger pair and swap the registry slot.

use crate::data::ingest::hash_bytes;
use crate::error::PipelineError;
use crate::evaluate::EvaluationOutcome;
use crate::features::FittedTransformer;
use crate::registry::{ModelRegistry, RegistryRecord};
use crate::train::ModelArtifact;
use baton_core::storage::ObjectStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terminal status of the push stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Promoted,
    Skipped,
}

/// The push stage.
pub struct Pusher {
    store: Arc<dyn ObjectStore>,
}

impl Pusher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// No-op when the evaluator rejected the challenger. Otherwise the
    /// model and transformer are made durable under the run's key prefix
    /// first, and only then does the registry record swap to the new
    /// pair; a failure anywhere before that swap leaves the previous
    /// champion authoritative, never a mixed pair.
    pub async fn push(
        &self,
        registry: &ModelRegistry,
        run_id: &str,
        model: &ModelArtifact,
        transformer: &FittedTransformer,
        outcome: &EvaluationOutcome,
        observed: Option<&RegistryRecord>,
    ) -> Result<PushStatus, PipelineError> {
        if !outcome.is_accepted {
            tracing::info!(
                challenger = outcome.challenger_metric,
                "challenger rejected; champion unchanged"
            );
            return Ok(PushStatus::Skipped);
        }

        let model_key = format!("runs/{run_id}/model/model.json");
        let transformer_key = format!("runs/{run_id}/model/transformer.json");

        let model_bytes = serde_json::to_vec_pretty(&model.model)?;
        self.store
            .put(&model_key, &model_bytes)
            .await
            .map_err(|e| PipelineError::push(format!("model upload failed: {e}")))?;

        let transformer_bytes = serde_json::to_vec_pretty(transformer)?;
        self.store
            .put(&transformer_key, &transformer_bytes)
            .await
            .map_err(|e| PipelineError::push(format!("transformer upload failed: {e}")))?;

        let expected_version = observed.map(|r| r.version).unwrap_or(0);
        let candidate = RegistryRecord {
            version: expected_version,
            run_id: run_id.to_string(),
            model_key,
            transformer_key,
            model_hash: hash_bytes(&model_bytes),
            metric: outcome.challenger_metric,
            promoted_at: Utc::now(),
        };
        registry.promote(expected_version, candidate).await?;

        Ok(PushStatus::Promoted)
    }
}

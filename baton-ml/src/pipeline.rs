//! Pipeline orchestration.
//!
//! One run walks the stage machine `Ingesting -> Validating -> Transforming
//! -> Training -> Evaluating -> {Pushing | Skipped} -> Done`, with `Failed`
//! terminal from any stage. Control flow is strictly linear; each stage
//! consumes the artifact its predecessor produced, and nothing re-reads the
//! raw source after ingestion. There are no automatic retries; a failed
//! run is reported whole and must be re-triggered externally.

use crate::data::batch::RecordBatch;
use crate::data::ingest::Ingestor;
use crate::data::schema::TableSchema;
use crate::data::source::RecordSource;
use crate::data::validate::{DatasetValidator, ValidationReport};
use crate::error::PipelineError;
use crate::evaluate::{EvaluationOutcome, Evaluator};
use crate::features::FittedTransformer;
use crate::model::ClassificationMetrics;
use crate::push::{PushStatus, Pusher};
use crate::registry::ModelRegistry;
use crate::train::Trainer;
use baton_core::PipelineConfig;
use baton_core::storage::{ObjectStore, get_json, put_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Stages of the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Ingesting,
    Validating,
    Transforming,
    Training,
    Evaluating,
    Pushing,
    Skipped,
    Done,
    Failed,
}

/// Wall-clock duration of one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub duration_ms: u64,
}

/// Full account of one run, persisted under the run's key prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub state: PipelineStage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageTiming>,
    pub validation: Option<ValidationReport>,
    pub training_metrics: Option<ClassificationMetrics>,
    pub evaluation: Option<EvaluationOutcome>,
    pub push: Option<PushStatus>,
    pub failed_stage: Option<PipelineStage>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl RunReport {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            state: PipelineStage::Ingesting,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            validation: None,
            training_metrics: None,
            evaluation: None,
            push: None,
            failed_stage: None,
            error_kind: None,
            error: None,
        }
    }

    /// Whether the run promoted its challenger.
    pub fn promoted(&self) -> bool {
        self.push == Some(PushStatus::Promoted)
    }
}

/// The pipeline orchestrator.
pub struct Pipeline {
    config: PipelineConfig,
    schema: TableSchema,
    source: Arc<dyn RecordSource>,
    store: Arc<dyn ObjectStore>,
    registry: ModelRegistry,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        schema: TableSchema,
        source: Arc<dyn RecordSource>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let registry = ModelRegistry::new(store.clone(), config.registry.slot.clone());
        Self {
            config,
            schema,
            source,
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Execute one run. Errors are folded into the returned report rather
    /// than propagated: a failed run reports which stage failed and why,
    /// and a successful one reports whether the model was promoted.
    pub async fn run(&self) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut report = RunReport::new(run_id.clone());
        tracing::info!(run_id = %run_id, "pipeline run started");

        match self.execute(&run_id, &mut report).await {
            Ok(status) => {
                report.state = PipelineStage::Done;
                report.push = Some(status);
                tracing::info!(
                    run_id = %run_id,
                    promoted = report.promoted(),
                    "pipeline run finished"
                );
            }
            Err((stage, err)) => {
                tracing::error!(run_id = %run_id, stage = ?stage, error = %err, "pipeline run failed");
                report.state = PipelineStage::Failed;
                report.failed_stage = Some(stage);
                report.error_kind = Some(err.kind().to_string());
                report.error = Some(err.to_string());
            }
        }
        report.finished_at = Some(Utc::now());

        // Best-effort: losing the report must not mask the run outcome.
        let report_key = format!("runs/{run_id}/report.json");
        if let Err(e) = put_json(self.store.as_ref(), &report_key, &report).await {
            tracing::warn!(run_id = %run_id, error = %e, "failed to persist run report");
        }
        report
    }

    async fn execute(
        &self,
        run_id: &str,
        report: &mut RunReport,
    ) -> Result<PushStatus, (PipelineStage, PipelineError)> {
        let fail = |stage: PipelineStage| move |err: PipelineError| (stage, err);

        // Ingesting
        let started = Instant::now();
        report.state = PipelineStage::Ingesting;
        let ingestor = Ingestor::new(self.store.clone());
        let dataset = ingestor
            .ingest(
                self.source.as_ref(),
                self.config.ingestion.split_ratio,
                self.config.ingestion.seed,
                run_id,
            )
            .await
            .map_err(fail(PipelineStage::Ingesting))?;
        finish_stage(report, PipelineStage::Ingesting, started);

        // Validating
        let started = Instant::now();
        report.state = PipelineStage::Validating;
        let validator = DatasetValidator::new(self.store.clone());
        let validation = validator
            .validate(&dataset, &self.schema, &self.config.validation)
            .await
            .map_err(fail(PipelineStage::Validating))?;
        report.validation = Some(validation.clone());
        validation
            .ensure_clean()
            .map_err(fail(PipelineStage::Validating))?;
        finish_stage(report, PipelineStage::Validating, started);

        // Transforming: fit on train only, then encode both partitions.
        let started = Instant::now();
        report.state = PipelineStage::Transforming;
        let (transformer, train_features, test_features) = async {
            let train: RecordBatch = get_json(self.store.as_ref(), &dataset.train_key).await?;
            let test: RecordBatch = get_json(self.store.as_ref(), &dataset.test_key).await?;
            let transformer = FittedTransformer::fit(&train, &self.schema, &self.config.transform)?;
            let train_features = transformer.transform(&train)?;
            let test_features = transformer.transform(&test)?;
            Ok::<_, PipelineError>((transformer, train_features, test_features))
        }
        .await
        .map_err(fail(PipelineStage::Transforming))?;
        finish_stage(report, PipelineStage::Transforming, started);

        // Training
        let started = Instant::now();
        report.state = PipelineStage::Training;
        let model = Trainer::train(&train_features, &self.config.training)
            .map_err(fail(PipelineStage::Training))?;
        report.training_metrics = Some(model.training_metrics.clone());
        finish_stage(report, PipelineStage::Training, started);

        // Evaluating
        let started = Instant::now();
        report.state = PipelineStage::Evaluating;
        let evaluator = Evaluator::new(&self.registry);
        let (outcome, observed) = evaluator
            .evaluate(
                &model.model,
                &test_features,
                self.config.evaluation.acceptance_threshold,
            )
            .await
            .map_err(fail(PipelineStage::Evaluating))?;
        report.evaluation = Some(outcome.clone());
        finish_stage(report, PipelineStage::Evaluating, started);

        // Pushing (or skipping)
        let started = Instant::now();
        report.state = PipelineStage::Pushing;
        let pusher = Pusher::new(self.store.clone());
        let status = pusher
            .push(
                &self.registry,
                run_id,
                &model,
                &transformer,
                &outcome,
                observed.as_ref(),
            )
            .await
            .map_err(fail(PipelineStage::Pushing))?;
        let branch = match status {
            PushStatus::Promoted => PipelineStage::Pushing,
            PushStatus::Skipped => PipelineStage::Skipped,
        };
        finish_stage(report, branch, started);

        Ok(status)
    }
}

fn finish_stage(report: &mut RunReport, stage: PipelineStage, started: Instant) {
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(stage = ?stage, duration_ms, "stage finished");
    report.stages.push(StageTiming { stage, duration_ms });
}

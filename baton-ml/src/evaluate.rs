//! Challenger-vs-champion evaluation on the held-out test set.

use crate::error::PipelineError;
use crate::features::FeatureArtifact;
use crate::model::FittedModel;
use crate::registry::{ModelRegistry, RegistryRecord};
use serde::{Deserialize, Serialize};

/// Outcome of one evaluation. Derived per run, never persisted beyond the
/// run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Challenger F1 on the held-out test set.
    pub challenger_metric: f64,
    /// Champion F1 on the same test set; `None` on a first run.
    pub champion_metric: Option<f64>,
    /// `challenger - champion`; `None` on a first run.
    pub delta: Option<f64>,
    pub threshold: f64,
    pub is_accepted: bool,
}

/// The evaluation stage.
pub struct Evaluator<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// Score the challenger, and the champion when one exists, on the same
    /// test features. An empty registry is the designed first-run state and
    /// accepts unconditionally; a champion whose artifacts cannot be loaded
    /// is fatal. The challenger is accepted only when its metric exceeds
    /// the champion's by strictly more than `threshold`; ties and
    /// sub-threshold gains never redeploy.
    ///
    /// Also returns the champion record that was observed (if any) so the
    /// pusher can compare-and-swap against its version stamp.
    pub async fn evaluate(
        &self,
        challenger: &FittedModel,
        test: &FeatureArtifact,
        threshold: f64,
    ) -> Result<(EvaluationOutcome, Option<RegistryRecord>), PipelineError> {
        let challenger_metric = challenger
            .score(&test.features, &test.labels)
            .map_err(|e| PipelineError::evaluation(format!("challenger scoring failed: {e}")))?;

        let observed = self.registry.current().await?;
        let outcome = match &observed {
            None => {
                tracing::info!(
                    challenger = challenger_metric,
                    "no champion in registry; challenger accepted unconditionally"
                );
                EvaluationOutcome {
                    challenger_metric,
                    champion_metric: None,
                    delta: None,
                    threshold,
                    is_accepted: true,
                }
            }
            Some(record) => {
                let (champion, _transformer) = self.registry.load_champion(record).await?;
                let champion_metric = champion
                    .score(&test.features, &test.labels)
                    .map_err(|e| PipelineError::evaluation(format!("champion scoring failed: {e}")))?;
                let delta = challenger_metric - champion_metric;
                let is_accepted = delta > threshold;
                tracing::info!(
                    challenger = challenger_metric,
                    champion = champion_metric,
                    delta,
                    accepted = is_accepted,
                    "evaluated challenger against champion"
                );
                EvaluationOutcome {
                    challenger_metric,
                    champion_metric: Some(champion_metric),
                    delta: Some(delta),
                    threshold,
                    is_accepted,
                }
            }
        };

        Ok((outcome, observed))
    }
}

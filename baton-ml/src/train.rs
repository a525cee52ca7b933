//! Training: fit the challenger estimator on transformed features.

use crate::error::PipelineError;
use crate::features::FeatureArtifact;
use crate::model::{ClassificationMetrics, FittedModel, build_estimator};
use baton_core::config::{EstimatorConfig, TrainingConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trained challenger model with its provenance.
///
/// Training-set metrics are diagnostic only; promotion decisions use the
/// evaluator's held-out test metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: FittedModel,
    pub estimator: EstimatorConfig,
    pub seed: u64,
    pub training_metrics: ClassificationMetrics,
    pub trained_at: DateTime<Utc>,
}

/// The training stage.
pub struct Trainer;

impl Trainer {
    pub fn train(
        features: &FeatureArtifact,
        config: &TrainingConfig,
    ) -> Result<ModelArtifact, PipelineError> {
        if features.features.is_empty() {
            return Err(PipelineError::training("training set is empty"));
        }

        let mut estimator = build_estimator(&config.estimator, config.seed);
        estimator.fit(&features.features, &features.labels)?;

        let predicted = estimator.predict(&features.features)?;
        let training_metrics =
            ClassificationMetrics::from_predictions(&features.labels, &predicted);

        let model = estimator.snapshot();
        tracing::info!(
            kind = model.kind(),
            rows = features.features.len(),
            train_f1 = training_metrics.f1_score,
            "trained challenger model"
        );

        Ok(ModelArtifact {
            model,
            estimator: config.estimator.clone(),
            seed: config.seed,
            training_metrics,
            trained_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_features() -> FeatureArtifact {
        FeatureArtifact {
            features: (0..20)
                .map(|i| vec![if i % 2 == 0 { -1.0 } else { 1.0 }])
                .collect(),
            labels: (0..20).map(|i| (i % 2) as f64).collect(),
        }
    }

    #[test]
    fn test_train_produces_fitted_artifact() {
        let artifact = Trainer::train(&separable_features(), &TrainingConfig::default()).unwrap();
        assert_eq!(artifact.model.kind(), "logistic");
        assert!(artifact.training_metrics.f1_score > 0.9);
    }

    #[test]
    fn test_train_is_deterministic() {
        let config = TrainingConfig::default();
        let a = Trainer::train(&separable_features(), &config).unwrap();
        let b = Trainer::train(&separable_features(), &config).unwrap();
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty = FeatureArtifact {
            features: Vec::new(),
            labels: Vec::new(),
        };
        let err = Trainer::train(&empty, &TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_tree_estimator_trains() {
        let config = TrainingConfig {
            estimator: EstimatorConfig::DecisionTree {
                max_depth: 3,
                min_samples_split: 2,
            },
            seed: 42,
        };
        let artifact = Trainer::train(&separable_features(), &config).unwrap();
        assert_eq!(artifact.model.kind(), "decision_tree");
        assert_eq!(artifact.training_metrics.f1_score, 1.0);
    }
}

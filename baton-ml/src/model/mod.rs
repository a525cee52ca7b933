//! Estimators: the capability trait, concrete models, and metrics.
//!
//! The trainer is written against [`Estimator`] only; concrete model types
//! implement it and snapshot their fitted parameters into [`FittedModel`]
//! for registry transport.

pub mod linear;
pub mod metrics;
pub mod tree;

pub use linear::LogisticRegression;
pub use metrics::ClassificationMetrics;
pub use tree::DecisionTree;

use crate::error::PipelineError;
use baton_core::config::EstimatorConfig;
use serde::{Deserialize, Serialize};

/// Capability interface every estimator provides.
pub trait Estimator: Send + Sync {
    /// Fit on a feature matrix and 0/1 label vector.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), PipelineError>;

    /// Predict a probability per row. Fails if the estimator is unfitted
    /// or the feature width does not match the fitted width.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PipelineError>;

    /// F1 score of the estimator's predictions against `labels`.
    fn score(&self, features: &[Vec<f64>], labels: &[f64]) -> Result<f64, PipelineError> {
        let predicted = self.predict(features)?;
        Ok(ClassificationMetrics::from_predictions(labels, &predicted).f1_score)
    }

    /// Snapshot the fitted parameters for serialization.
    fn snapshot(&self) -> FittedModel;
}

/// Serializable fitted parameters of a trained estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FittedModel {
    Logistic(LogisticRegression),
    DecisionTree(DecisionTree),
}

impl FittedModel {
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PipelineError> {
        match self {
            Self::Logistic(model) => model.predict(features),
            Self::DecisionTree(model) => model.predict(features),
        }
    }

    pub fn score(&self, features: &[Vec<f64>], labels: &[f64]) -> Result<f64, PipelineError> {
        match self {
            Self::Logistic(model) => model.score(features, labels),
            Self::DecisionTree(model) => model.score(features, labels),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logistic(_) => "logistic",
            Self::DecisionTree(_) => "decision_tree",
        }
    }
}

/// Build an unfitted estimator from its configuration.
pub fn build_estimator(config: &EstimatorConfig, seed: u64) -> Box<dyn Estimator> {
    match config {
        EstimatorConfig::Logistic {
            learning_rate,
            epochs,
            l2,
        } => Box::new(LogisticRegression::new(*learning_rate, *epochs, *l2, seed)),
        EstimatorConfig::DecisionTree {
            max_depth,
            min_samples_split,
        } => Box::new(DecisionTree::new(*max_depth, *min_samples_split)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_estimator_variants() {
        let logistic = build_estimator(&EstimatorConfig::default(), 42);
        assert_eq!(logistic.snapshot().kind(), "logistic");

        let tree = build_estimator(
            &EstimatorConfig::DecisionTree {
                max_depth: 3,
                min_samples_split: 2,
            },
            42,
        );
        assert_eq!(tree.snapshot().kind(), "decision_tree");
    }

    #[test]
    fn test_fitted_model_serde_roundtrip() {
        let mut estimator = build_estimator(&EstimatorConfig::default(), 42);
        let features = vec![vec![0.0], vec![1.0], vec![0.1], vec![0.9]];
        let labels = vec![0.0, 1.0, 0.0, 1.0];
        estimator.fit(&features, &labels).unwrap();

        let model = estimator.snapshot();
        let json = serde_json::to_string(&model).unwrap();
        let restored: FittedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, model);
        assert_eq!(
            restored.predict(&features).unwrap(),
            model.predict(&features).unwrap()
        );
    }
}

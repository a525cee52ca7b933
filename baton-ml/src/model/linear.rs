//! Logistic regression fitted with full-batch gradient descent.

use crate::error::PipelineError;
use crate::model::{Estimator, FittedModel};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Binary logistic regression. Weight initialization is seeded, so a fixed
/// seed and hyperparameters always produce the same fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub seed: u64,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub fitted: bool,
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, epochs: usize, l2: f64, seed: u64) -> Self {
        Self {
            learning_rate,
            epochs,
            l2,
            seed,
            weights: Vec::new(),
            bias: 0.0,
            fitted: false,
        }
    }

    fn logit(&self, row: &[f64]) -> f64 {
        let dot: f64 = self
            .weights
            .iter()
            .zip(row.iter())
            .map(|(w, x)| w * x)
            .sum();
        dot + self.bias
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), PipelineError> {
        if features.is_empty() || labels.len() != features.len() {
            return Err(PipelineError::training(format!(
                "expected matching non-empty features and labels, got {} rows and {} labels",
                features.len(),
                labels.len()
            )));
        }
        let width = features[0].len();

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.weights = (0..width).map(|_| rng.gen_range(-0.01..0.01)).collect();
        self.bias = 0.0;

        let n = features.len() as f64;
        for epoch in 0..self.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &label) in features.iter().zip(labels.iter()) {
                let error = sigmoid(self.logit(row)) - label;
                for (g, &x) in grad_w.iter_mut().zip(row.iter()) {
                    *g += error * x;
                }
                grad_b += error;
            }
            for (w, g) in self.weights.iter_mut().zip(grad_w.iter()) {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_b / n;

            if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
                return Err(PipelineError::training(format!(
                    "gradient descent diverged at epoch {epoch}"
                )));
            }
        }

        self.fitted = true;
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PipelineError> {
        if !self.fitted {
            return Err(PipelineError::training("estimator has not been fitted"));
        }
        for (idx, row) in features.iter().enumerate() {
            if row.len() != self.weights.len() {
                return Err(PipelineError::training(format!(
                    "row {idx}: expected {} features, got {}",
                    self.weights.len(),
                    row.len()
                )));
            }
        }
        Ok(features
            .iter()
            .map(|row| sigmoid(self.logit(row)))
            .collect())
    }

    fn snapshot(&self) -> FittedModel {
        FittedModel::Logistic(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    vec![-1.0 - (i as f64) * 0.01]
                } else {
                    vec![1.0 + (i as f64) * 0.01]
                }
            })
            .collect();
        let labels: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
        (features, labels)
    }

    #[test]
    fn test_learns_separable_data() {
        let (features, labels) = separable();
        let mut model = LogisticRegression::new(0.5, 300, 0.0, 42);
        model.fit(&features, &labels).unwrap();
        let score = model.score(&features, &labels).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (features, labels) = separable();
        let mut a = LogisticRegression::new(0.1, 50, 0.0, 7);
        let mut b = LogisticRegression::new(0.1, 50, 0.0, 7);
        a.fit(&features, &labels).unwrap();
        b.fit(&features, &labels).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut model = LogisticRegression::new(0.1, 10, 0.0, 42);
        let err = model.fit(&[], &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_unfitted_predict_rejected() {
        let model = LogisticRegression::new(0.1, 10, 0.0, 42);
        let err = model.predict(&[vec![1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let (features, labels) = separable();
        let mut model = LogisticRegression::new(0.1, 10, 0.0, 42);
        model.fit(&features, &labels).unwrap();
        let err = model.predict(&[vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_divergent_learning_rate_detected() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![(i as f64) * 1e3]).collect();
        let labels: Vec<f64> = (0..20).map(|i| (i % 2) as f64).collect();
        let mut model = LogisticRegression::new(1e18, 500, 0.0, 42);
        // Either divergence is caught or the fit stays finite; it must not panic.
        if let Err(err) = model.fit(&features, &labels) {
            assert!(matches!(err, PipelineError::Training(_)));
        }
    }
}

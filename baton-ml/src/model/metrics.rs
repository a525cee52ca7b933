//! Classification metrics.

use serde::{Deserialize, Serialize};

/// Binary classification metrics. Predictions are probabilities and are
/// binarized at 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl ClassificationMetrics {
    pub fn from_predictions(truth: &[f64], predicted: &[f64]) -> Self {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut tn = 0usize;
        let mut fneg = 0usize;

        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            let actual = t > 0.5;
            let guessed = p > 0.5;
            match (actual, guessed) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fneg += 1,
            }
        }

        let total = tp + fp + tn + fneg;
        let accuracy = if total == 0 {
            0.0
        } else {
            (tp + tn) as f64 / total as f64
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fneg);
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

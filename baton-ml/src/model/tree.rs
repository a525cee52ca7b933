//! Gini-impurity decision tree (CART) for binary classification.

use crate::error::PipelineError;
use crate::model::{Estimator, FittedModel};
use serde::{Deserialize, Serialize};

/// A node in the fitted tree, stored in an index-based arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Depth-bounded CART classifier. Splits minimize weighted gini impurity;
/// leaves predict the positive-class fraction of their samples. Fitting is
/// fully deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub nodes: Vec<TreeNode>,
    pub feature_width: usize,
}

impl DecisionTree {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            max_depth,
            min_samples_split,
            nodes: Vec::new(),
            feature_width: 0,
        }
    }

    fn build(
        &mut self,
        features: &[Vec<f64>],
        labels: &[f64],
        indices: &[usize],
        depth: usize,
    ) -> usize {
        let positive = indices.iter().filter(|&&i| labels[i] > 0.5).count();
        let fraction = positive as f64 / indices.len() as f64;

        let pure = positive == 0 || positive == indices.len();
        if pure || depth >= self.max_depth || indices.len() < self.min_samples_split {
            self.nodes.push(TreeNode::Leaf { value: fraction });
            return self.nodes.len() - 1;
        }

        let Some((feature, threshold)) = best_split(features, labels, indices) else {
            self.nodes.push(TreeNode::Leaf { value: fraction });
            return self.nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| features[i][feature] <= threshold);

        // reserve the split slot before recursing so child indices are stable
        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: fraction });
        let left = self.build(features, labels, &left_idx, depth + 1);
        let right = self.build(features, labels, &right_idx, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_idx
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Find the (feature, threshold) pair minimizing weighted gini impurity.
/// Returns `None` when no split improves on the parent.
fn best_split(features: &[Vec<f64>], labels: &[f64], indices: &[usize]) -> Option<(usize, f64)> {
    let width = features[indices[0]].len();
    let parent_gini = gini(labels, indices);

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in 0..width {
        let mut values: Vec<f64> = indices.iter().map(|&i| features[i][feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| features[i][feature] <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let weighted = (left.len() as f64 * gini(labels, &left)
                + right.len() as f64 * gini(labels, &right))
                / indices.len() as f64;
            if weighted < parent_gini - 1e-12
                && best.map(|(_, _, g)| weighted < g).unwrap_or(true)
            {
                best = Some((feature, threshold, weighted));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}

fn gini(labels: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let positive = indices.iter().filter(|&&i| labels[i] > 0.5).count() as f64;
    let p = positive / indices.len() as f64;
    2.0 * p * (1.0 - p)
}

impl Estimator for DecisionTree {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[f64]) -> Result<(), PipelineError> {
        if features.is_empty() || labels.len() != features.len() {
            return Err(PipelineError::training(format!(
                "expected matching non-empty features and labels, got {} rows and {} labels",
                features.len(),
                labels.len()
            )));
        }
        self.feature_width = features[0].len();
        self.nodes.clear();
        let indices: Vec<usize> = (0..features.len()).collect();
        self.build(features, labels, &indices, 0);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PipelineError> {
        if self.nodes.is_empty() {
            return Err(PipelineError::training("estimator has not been fitted"));
        }
        for (idx, row) in features.iter().enumerate() {
            if row.len() != self.feature_width {
                return Err(PipelineError::training(format!(
                    "row {idx}: expected {} features, got {}",
                    self.feature_width,
                    row.len()
                )));
            }
        }
        Ok(features.iter().map(|row| self.predict_row(row)).collect())
    }

    fn snapshot(&self) -> FittedModel {
        FittedModel::DecisionTree(self.clone())
    }
}

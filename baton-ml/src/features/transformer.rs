//! Fitted preprocessing: imputation, scaling, and one-hot encoding.
//!
//! The transformer is fit exclusively on the train partition (never on
//! test), and its fitted state is fully serializable so serving reproduces
//! the training-time encoding exactly: same category order, same fill
//! values, same scaling parameters.

use crate::data::batch::RecordBatch;
use crate::data::schema::{ColumnKind, TableSchema};
use crate::error::PipelineError;
use baton_core::config::{ImputationStrategy, ScalingMethod, TransformConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Model-ready features and labels for one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureArtifact {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

/// Fitted state for one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FittedColumn {
    /// Numeric column: `fill` replaces nulls, then the value is mapped to
    /// `(v - center) / spread`.
    Numeric {
        name: String,
        fill: f64,
        center: f64,
        spread: f64,
    },
    /// Categorical column: one-hot over the fitted category order. Values
    /// outside the category set encode as an all-zero block.
    Categorical { name: String, categories: Vec<String> },
    /// Boolean column: 0/1 passthrough.
    Boolean { name: String },
}

impl FittedColumn {
    fn name(&self) -> &str {
        match self {
            Self::Numeric { name, .. }
            | Self::Categorical { name, .. }
            | Self::Boolean { name } => name,
        }
    }

    fn width(&self) -> usize {
        match self {
            Self::Categorical { categories, .. } => categories.len(),
            _ => 1,
        }
    }
}

/// A preprocessing pipeline with all statistics frozen at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransformer {
    pub label_column: String,
    pub columns: Vec<FittedColumn>,
}

impl FittedTransformer {
    /// Fit column statistics on the train partition.
    ///
    /// Every feature column of the batch must be declared in the schema;
    /// category tables come from the schema's declared domain when present,
    /// otherwise from the distinct train values.
    pub fn fit(
        train: &RecordBatch,
        schema: &TableSchema,
        config: &TransformConfig,
    ) -> Result<Self, PipelineError> {
        if train.column_index(&config.label_column).is_none() {
            return Err(PipelineError::transformation(format!(
                "label column '{}' not present in dataset",
                config.label_column
            )));
        }
        for column in &train.columns {
            if column != &config.label_column && schema.column(column).is_none() {
                return Err(PipelineError::transformation(format!(
                    "column '{column}' is not declared in the schema"
                )));
            }
        }

        let mut columns = Vec::new();
        for spec in &schema.columns {
            if spec.name == config.label_column {
                continue;
            }
            if train.column_index(&spec.name).is_none() {
                return Err(PipelineError::transformation(format!(
                    "schema column '{}' missing from train partition",
                    spec.name
                )));
            }

            let fitted = match spec.kind {
                ColumnKind::Integer | ColumnKind::Float => {
                    let values = train.numeric_column(&spec.name);
                    let fill = match config.imputation {
                        ImputationStrategy::Median => median(&values),
                        ImputationStrategy::Mean => mean(&values),
                    };
                    let (center, spread) = match config.scaling {
                        ScalingMethod::ZScore => {
                            let m = mean(&values);
                            (m, non_zero(std_dev(&values, m)))
                        }
                        ScalingMethod::MinMax => {
                            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                            if values.is_empty() {
                                (0.0, 1.0)
                            } else {
                                (min, non_zero(max - min))
                            }
                        }
                    };
                    FittedColumn::Numeric {
                        name: spec.name.clone(),
                        fill,
                        center,
                        spread,
                    }
                }
                ColumnKind::Categorical => {
                    let categories = match &spec.domain {
                        Some(domain) => domain.clone(),
                        None => train
                            .string_column(&spec.name)
                            .into_iter()
                            .collect::<BTreeSet<_>>()
                            .into_iter()
                            .collect(),
                    };
                    FittedColumn::Categorical {
                        name: spec.name.clone(),
                        categories,
                    }
                }
                ColumnKind::Boolean => FittedColumn::Boolean {
                    name: spec.name.clone(),
                },
            };
            columns.push(fitted);
        }

        Ok(Self {
            label_column: config.label_column.clone(),
            columns,
        })
    }

    /// Encode a batch's feature columns with the fitted state.
    pub fn encode(&self, batch: &RecordBatch) -> Result<Vec<Vec<f64>>, PipelineError> {
        let mut indices = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let idx = batch.column_index(column.name()).ok_or_else(|| {
                PipelineError::transformation(format!(
                    "column '{}' missing from batch",
                    column.name()
                ))
            })?;
            indices.push(idx);
        }

        let mut matrix = Vec::with_capacity(batch.row_count());
        for (row_idx, row) in batch.rows.iter().enumerate() {
            let mut encoded = Vec::with_capacity(self.feature_width());
            for (column, &idx) in self.columns.iter().zip(&indices) {
                let cell = row.get(idx).unwrap_or(&Value::Null);
                self.encode_cell(column, cell, row_idx, &mut encoded)?;
            }
            matrix.push(encoded);
        }
        Ok(matrix)
    }

    /// Encode features and extract the label vector for a training or
    /// evaluation partition.
    pub fn transform(&self, batch: &RecordBatch) -> Result<FeatureArtifact, PipelineError> {
        let features = self.encode(batch)?;

        let label_idx = batch.column_index(&self.label_column).ok_or_else(|| {
            PipelineError::transformation(format!(
                "label column '{}' missing from batch",
                self.label_column
            ))
        })?;
        let mut labels = Vec::with_capacity(batch.row_count());
        for (row_idx, row) in batch.rows.iter().enumerate() {
            let cell = row.get(label_idx).unwrap_or(&Value::Null);
            let label = match cell {
                Value::Bool(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                other => other.as_f64().ok_or_else(|| {
                    PipelineError::transformation(format!(
                        "row {row_idx}: label '{}' is not numeric",
                        self.label_column
                    ))
                })?,
            };
            labels.push(label);
        }

        Ok(FeatureArtifact { features, labels })
    }

    fn encode_cell(
        &self,
        column: &FittedColumn,
        cell: &Value,
        row_idx: usize,
        out: &mut Vec<f64>,
    ) -> Result<(), PipelineError> {
        match column {
            FittedColumn::Numeric {
                name,
                fill,
                center,
                spread,
            } => {
                let raw = if cell.is_null() {
                    *fill
                } else {
                    cell.as_f64().ok_or_else(|| {
                        PipelineError::transformation(format!(
                            "row {row_idx}: column '{name}' is not numeric"
                        ))
                    })?
                };
                out.push((raw - center) / spread);
            }
            FittedColumn::Categorical { name, categories } => {
                let hit = match cell {
                    Value::Null => None,
                    Value::String(s) => categories.iter().position(|c| c == s),
                    other => {
                        return Err(PipelineError::transformation(format!(
                            "row {row_idx}: column '{name}' expected a string, got {other}"
                        )));
                    }
                };
                for i in 0..categories.len() {
                    out.push(if Some(i) == hit { 1.0 } else { 0.0 });
                }
            }
            FittedColumn::Boolean { name } => {
                let v = match cell {
                    Value::Null => 0.0,
                    Value::Bool(true) => 1.0,
                    Value::Bool(false) => 0.0,
                    other => {
                        return Err(PipelineError::transformation(format!(
                            "row {row_idx}: column '{name}' expected a boolean, got {other}"
                        )));
                    }
                };
                out.push(v);
            }
        }
        Ok(())
    }

    /// Expanded feature names, one per output column.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.feature_width());
        for column in &self.columns {
            match column {
                FittedColumn::Categorical { name, categories } => {
                    for category in categories {
                        names.push(format!("{name}={category}"));
                    }
                }
                other => names.push(other.name().to_string()),
            }
        }
        names
    }

    pub fn feature_width(&self) -> usize {
        self.columns.iter().map(FittedColumn::width).sum()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn non_zero(spread: f64) -> f64 {
    if spread == 0.0 { 1.0 } else { spread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::TableSchema;
    use pretty_assertions::assert_eq;

    fn schema() -> TableSchema {
        TableSchema::from_toml_str(
            r#"
[[columns]]
name = "age"
kind = "integer"
min = 18
max = 100

[[columns]]
name = "region"
kind = "categorical"
domain = ["A", "B", "C"]

[[columns]]
name = "label"
kind = "integer"
min = 0
max = 1
"#,
        )
        .unwrap()
    }

    fn config() -> TransformConfig {
        TransformConfig::default()
    }

    fn train_batch() -> RecordBatch {
        RecordBatch::new(
            vec!["age".into(), "region".into(), "label".into()],
            vec![
                vec![
                    serde_json::json!(20),
                    serde_json::json!("A"),
                    serde_json::json!(0),
                ],
                vec![
                    serde_json::json!(40),
                    serde_json::json!("B"),
                    serde_json::json!(1),
                ],
                vec![
                    serde_json::json!(60),
                    serde_json::json!("A"),
                    serde_json::json!(1),
                ],
            ],
        )
    }

    #[test]
    fn test_fit_and_transform_shapes() {
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        // age -> 1 column, region -> 3 one-hot columns
        assert_eq!(transformer.feature_width(), 4);
        assert_eq!(
            transformer.feature_names(),
            vec!["age", "region=A", "region=B", "region=C"]
        );

        let artifact = transformer.transform(&train_batch()).unwrap();
        assert_eq!(artifact.features.len(), 3);
        assert_eq!(artifact.features[0].len(), 4);
        assert_eq!(artifact.labels, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_zscore_scaling_centers_train() {
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        let artifact = transformer.transform(&train_batch()).unwrap();
        // mean of standardized train column is 0
        let sum: f64 = artifact.features.iter().map(|row| row[0]).sum();
        assert!(sum.abs() < 1e-9);
    }

    #[test]
    fn test_one_hot_encoding() {
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        let artifact = transformer.transform(&train_batch()).unwrap();
        assert_eq!(&artifact.features[0][1..4], &[1.0, 0.0, 0.0]); // A
        assert_eq!(&artifact.features[1][1..4], &[0.0, 1.0, 0.0]); // B
    }

    #[test]
    fn test_in_domain_unseen_category_encodes() {
        // "C" never appears in train but is in the declared domain.
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        let test = RecordBatch::new(
            vec!["age".into(), "region".into(), "label".into()],
            vec![vec![
                serde_json::json!(30),
                serde_json::json!("C"),
                serde_json::json!(0),
            ]],
        );
        let artifact = transformer.transform(&test).unwrap();
        assert_eq!(&artifact.features[0][1..4], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_null_numeric_imputed_with_median() {
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        let test = RecordBatch::new(
            vec!["age".into(), "region".into(), "label".into()],
            vec![vec![
                serde_json::Value::Null,
                serde_json::json!("A"),
                serde_json::json!(0),
            ]],
        );
        let artifact = transformer.transform(&test).unwrap();
        // median of {20, 40, 60} is 40; standardized 40 is (40 - 40) / std = 0
        assert!(artifact.features[0][0].abs() < 1e-9);
    }

    #[test]
    fn test_undeclared_column_rejected_at_fit() {
        let mut batch = train_batch();
        batch.columns.push("rogue".into());
        for row in &mut batch.rows {
            row.push(serde_json::json!(1));
        }
        let err = FittedTransformer::fit(&batch, &schema(), &config()).unwrap_err();
        assert!(matches!(err, PipelineError::Transformation(_)));
    }

    #[test]
    fn test_missing_column_rejected_at_transform() {
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        let test = RecordBatch::new(
            vec!["age".into(), "label".into()],
            vec![vec![serde_json::json!(30), serde_json::json!(0)]],
        );
        let err = transformer.transform(&test).unwrap_err();
        assert!(matches!(err, PipelineError::Transformation(_)));
    }

    #[test]
    fn test_fitted_state_serde_roundtrip() {
        let transformer = FittedTransformer::fit(&train_batch(), &schema(), &config()).unwrap();
        let json = serde_json::to_string(&transformer).unwrap();
        let restored: FittedTransformer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, transformer);

        // identical encodings after the roundtrip
        let a = transformer.transform(&train_batch()).unwrap();
        let b = restored.transform(&train_batch()).unwrap();
        assert_eq!(a.features, b.features);
    }

    #[test]
    fn test_median_helper() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}

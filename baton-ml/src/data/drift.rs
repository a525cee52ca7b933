//! Distributional drift between train and test partitions.
//!
//! Uses the Population Stability Index: numeric columns are binned by the
//! train partition's deciles, categorical columns by value frequency, and
//! the PSI of the two proportion vectors is compared against a configured
//! threshold. Proportions are smoothed so empty bins never divide by zero.

use crate::data::batch::RecordBatch;
use crate::data::schema::{ColumnKind, TableSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PSI_BINS: usize = 10;
const SMOOTHING: f64 = 1e-4;

/// Drift measurement for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column: String,
    pub psi: f64,
    pub drifted: bool,
}

/// Compare every schema column's train/test distribution.
pub fn detect(
    train: &RecordBatch,
    test: &RecordBatch,
    schema: &TableSchema,
    threshold: f64,
) -> Vec<ColumnDrift> {
    let mut results = Vec::new();
    for spec in &schema.columns {
        let psi = match spec.kind {
            ColumnKind::Integer | ColumnKind::Float => numeric_psi(
                &train.numeric_column(&spec.name),
                &test.numeric_column(&spec.name),
            ),
            ColumnKind::Categorical => categorical_psi(
                &train.string_column(&spec.name),
                &test.string_column(&spec.name),
            ),
            ColumnKind::Boolean => {
                let as_strings = |batch: &RecordBatch| {
                    let Some(idx) = batch.column_index(&spec.name) else {
                        return Vec::new();
                    };
                    batch
                        .rows
                        .iter()
                        .filter_map(|row| row.get(idx).and_then(|v| v.as_bool()))
                        .map(|b| b.to_string())
                        .collect::<Vec<_>>()
                };
                categorical_psi(&as_strings(train), &as_strings(test))
            }
        };
        results.push(ColumnDrift {
            column: spec.name.clone(),
            psi,
            drifted: psi > threshold,
        });
    }
    results
}

/// PSI between two numeric samples, binned by the baseline's deciles.
pub fn numeric_psi(baseline: &[f64], current: &[f64]) -> f64 {
    if baseline.is_empty() || current.is_empty() {
        return 0.0;
    }

    let mut sorted = baseline.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut edges = Vec::with_capacity(PSI_BINS + 1);
    edges.push(f64::NEG_INFINITY);
    for i in 1..PSI_BINS {
        let idx = (sorted.len() * i / PSI_BINS).min(sorted.len() - 1);
        edges.push(sorted[idx]);
    }
    edges.push(f64::INFINITY);

    let baseline_counts = bin_counts(baseline, &edges);
    let current_counts = bin_counts(current, &edges);
    psi_from_counts(&baseline_counts, &current_counts, baseline.len(), current.len())
}

/// PSI between two categorical samples, binned by value.
pub fn categorical_psi(baseline: &[String], current: &[String]) -> f64 {
    if baseline.is_empty() || current.is_empty() {
        return 0.0;
    }

    let mut categories: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for value in baseline {
        categories.entry(value).or_default().0 += 1;
    }
    for value in current {
        categories.entry(value).or_default().1 += 1;
    }

    let (baseline_counts, current_counts): (Vec<usize>, Vec<usize>) =
        categories.values().copied().unzip();
    psi_from_counts(&baseline_counts, &current_counts, baseline.len(), current.len())
}

fn bin_counts(data: &[f64], edges: &[f64]) -> Vec<usize> {
    let mut counts = vec![0usize; edges.len() - 1];
    for &value in data {
        for i in 0..counts.len() {
            if value > edges[i] && value <= edges[i + 1] {
                counts[i] += 1;
                break;
            }
        }
    }
    counts
}

fn psi_from_counts(
    baseline: &[usize],
    current: &[usize],
    baseline_total: usize,
    current_total: usize,
) -> f64 {
    let mut psi = 0.0;
    for (&b, &c) in baseline.iter().zip(current.iter()) {
        let b_pct = (b as f64 + SMOOTHING) / (baseline_total as f64 + SMOOTHING);
        let c_pct = (c as f64 + SMOOTHING) / (current_total as f64 + SMOOTHING);
        psi += (c_pct - b_pct) * (c_pct / b_pct).ln();
    }
    psi
}

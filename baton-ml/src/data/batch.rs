//! Row-oriented record batches exchanged between pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A batch of raw records: column names plus row-major cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordBatch {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All non-null numeric values of a column, in row order.
    pub fn numeric_column(&self, name: &str) -> Vec<f64> {
        let Some(idx) = self.column_index(name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(Value::as_f64))
            .collect()
    }

    /// All non-null string values of a column, in row order.
    pub fn string_column(&self, name: &str) -> Vec<String> {
        let Some(idx) = self.column_index(name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Stack another batch with identical columns below this one.
    /// Returns `None` when the column sets differ.
    pub fn vstack(&self, other: &Self) -> Option<Self> {
        if self.columns != other.columns {
            return None;
        }
        let mut rows = self.rows.clone();
        rows.extend(other.rows.iter().cloned());
        Some(Self {
            columns: self.columns.clone(),
            rows,
        })
    }
}

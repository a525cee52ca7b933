//! Record source abstraction for pulling raw records.
//!
//! The pipeline only needs a bulk read; any query parameters (paths,
//! delimiters) are carried by the source instance itself.

use crate::data::batch::RecordBatch;
use crate::error::PipelineError;
use async_trait::async_trait;
use baton_core::config::SourceConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Metadata about a record source, recorded for run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub kind: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for pulling all matching records from a document store.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every record this source holds.
    async fn fetch_all(&self) -> Result<RecordBatch, PipelineError>;

    /// Metadata about this source.
    fn source_info(&self) -> SourceInfo;
}

/// Build a source from its configuration.
pub fn source_from_config(config: &SourceConfig) -> Arc<dyn RecordSource> {
    match config {
        SourceConfig::Csv { path, delimiter } => Arc::new(CsvSource {
            path: path.clone(),
            delimiter: *delimiter,
        }),
        SourceConfig::Jsonl { path } => Arc::new(JsonlSource { path: path.clone() }),
    }
}

// ---------------------------------------------------------------------------
// JsonlSource
// ---------------------------------------------------------------------------

/// JSON Lines source — one JSON object per line.
pub struct JsonlSource {
    pub path: PathBuf,
}

#[async_trait]
impl RecordSource for JsonlSource {
    async fn fetch_all(&self) -> Result<RecordBatch, PipelineError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut items = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)?;
            items.push(value);
        }

        let Some(Value::Object(first)) = items.first() else {
            return Ok(RecordBatch::empty());
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        let rows: Vec<Vec<Value>> = items
            .iter()
            .map(|item| {
                columns
                    .iter()
                    .map(|col| item.get(col).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(RecordBatch::new(columns, rows))
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            kind: "jsonl".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV file source with typed cell parsing.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

impl CsvSource {
    /// Parse a raw CSV field into the narrowest matching JSON value.
    fn parse_cell(field: &str) -> Value {
        let field = field.trim().trim_matches('"');
        if field.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = field.parse::<i64>() {
            return Value::Number(i.into());
        }
        if let Ok(f) = field.parse::<f64>() {
            return serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null);
        }
        if field == "true" || field == "false" {
            return Value::Bool(field == "true");
        }
        Value::String(field.to_string())
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    async fn fetch_all(&self) -> Result<RecordBatch, PipelineError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut lines = content.lines();

        let Some(header) = lines.next() else {
            return Ok(RecordBatch::empty());
        };
        let columns: Vec<String> = header
            .split(self.delimiter)
            .map(|s| s.trim().trim_matches('"').to_string())
            .collect();

        let mut rows = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let row: Vec<Value> = line.split(self.delimiter).map(Self::parse_cell).collect();
            rows.push(row);
        }

        Ok(RecordBatch::new(columns, rows))
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            kind: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// In-memory source, used by tests and embedding callers.
pub struct MemorySource {
    pub batch: RecordBatch,
}

impl MemorySource {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch_all(&self) -> Result<RecordBatch, PipelineError> {
        Ok(self.batch.clone())
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            kind: "memory".to_string(),
            location: format!("{} rows", self.batch.row_count()),
            accessed_at: chrono::Utc::now(),
        }
    }
}

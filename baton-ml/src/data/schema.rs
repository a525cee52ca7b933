//! Declared table schemas and the schema validator.
//!
//! A schema is loaded once per run and never mutated. Validation walks the
//! whole batch and reports every violation it finds; it never stops at the
//! first defect, so the caller always sees the full defect set.

use crate::data::batch::RecordBatch;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Categorical,
    Boolean,
}

/// Declared shape of a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    /// Whether null cells are tolerated at all.
    #[serde(default)]
    pub nullable: bool,
    /// Maximum tolerated fraction of null cells. Defaults to 0 for
    /// non-nullable columns and 1 for nullable ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_null_fraction: Option<f64>,
    /// Inclusive lower bound for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Allowed values for categorical columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,
}

impl ColumnSpec {
    fn null_tolerance(&self) -> f64 {
        self.max_null_fraction
            .unwrap_or(if self.nullable { 1.0 } else { 0.0 })
    }
}

/// A named, ordered set of column declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
}

/// A single rule violation found during schema validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    MissingColumn {
        column: String,
    },
    UnexpectedColumn {
        column: String,
    },
    TypeMismatch {
        column: String,
        row: usize,
        expected: ColumnKind,
        actual: String,
    },
    OutOfRange {
        column: String,
        row: usize,
        value: f64,
    },
    OutOfDomain {
        column: String,
        row: usize,
        value: String,
    },
    NullExcess {
        column: String,
        null_fraction: f64,
        allowed: f64,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "column '{column}' is missing"),
            Self::UnexpectedColumn { column } => write!(f, "column '{column}' is not declared"),
            Self::TypeMismatch {
                column,
                row,
                expected,
                actual,
            } => write!(
                f,
                "column '{column}' row {row}: expected {expected:?}, got {actual}"
            ),
            Self::OutOfRange { column, row, value } => {
                write!(f, "column '{column}' row {row}: value {value} out of range")
            }
            Self::OutOfDomain { column, row, value } => {
                write!(f, "column '{column}' row {row}: '{value}' not in domain")
            }
            Self::NullExcess {
                column,
                null_fraction,
                allowed,
            } => write!(
                f,
                "column '{column}': null fraction {null_fraction:.3} exceeds allowed {allowed:.3}"
            ),
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl TableSchema {
    /// Load a schema from a TOML file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PipelineError> {
        toml::from_str(content)
            .map_err(|e| PipelineError::schema_violation(format!("invalid schema file: {e}")))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Validate a batch against this schema, accumulating every violation.
    pub fn check_batch(&self, batch: &RecordBatch, allow_extra_columns: bool) -> Vec<Violation> {
        let mut violations = Vec::new();
        let total_rows = batch.row_count();

        if !allow_extra_columns {
            for column in &batch.columns {
                if self.column(column).is_none() {
                    violations.push(Violation::UnexpectedColumn {
                        column: column.clone(),
                    });
                }
            }
        }

        for spec in &self.columns {
            let Some(idx) = batch.column_index(&spec.name) else {
                violations.push(Violation::MissingColumn {
                    column: spec.name.clone(),
                });
                continue;
            };

            let mut null_count = 0usize;
            for (row_idx, row) in batch.rows.iter().enumerate() {
                let cell = row.get(idx).unwrap_or(&Value::Null);
                if cell.is_null() {
                    null_count += 1;
                    continue;
                }
                self.check_cell(spec, cell, row_idx, &mut violations);
            }

            if total_rows > 0 {
                let null_fraction = null_count as f64 / total_rows as f64;
                let allowed = spec.null_tolerance();
                if null_fraction > allowed {
                    violations.push(Violation::NullExcess {
                        column: spec.name.clone(),
                        null_fraction,
                        allowed,
                    });
                }
            }
        }

        violations
    }

    fn check_cell(
        &self,
        spec: &ColumnSpec,
        cell: &Value,
        row: usize,
        violations: &mut Vec<Violation>,
    ) {
        match spec.kind {
            ColumnKind::Integer => {
                if cell.as_i64().is_none() && cell.as_u64().is_none() {
                    violations.push(Violation::TypeMismatch {
                        column: spec.name.clone(),
                        row,
                        expected: spec.kind,
                        actual: value_type_name(cell).to_string(),
                    });
                } else if let Some(v) = cell.as_f64() {
                    check_range(spec, v, row, violations);
                }
            }
            ColumnKind::Float => {
                if let Some(v) = cell.as_f64() {
                    check_range(spec, v, row, violations);
                } else {
                    violations.push(Violation::TypeMismatch {
                        column: spec.name.clone(),
                        row,
                        expected: spec.kind,
                        actual: value_type_name(cell).to_string(),
                    });
                }
            }
            ColumnKind::Categorical => match cell.as_str() {
                Some(s) => {
                    if let Some(domain) = &spec.domain {
                        if !domain.iter().any(|d| d == s) {
                            violations.push(Violation::OutOfDomain {
                                column: spec.name.clone(),
                                row,
                                value: s.to_string(),
                            });
                        }
                    }
                }
                None => violations.push(Violation::TypeMismatch {
                    column: spec.name.clone(),
                    row,
                    expected: spec.kind,
                    actual: value_type_name(cell).to_string(),
                }),
            },
            ColumnKind::Boolean => {
                if !cell.is_boolean() {
                    violations.push(Violation::TypeMismatch {
                        column: spec.name.clone(),
                        row,
                        expected: spec.kind,
                        actual: value_type_name(cell).to_string(),
                    });
                }
            }
        }
    }
}

fn check_range(spec: &ColumnSpec, value: f64, row: usize, violations: &mut Vec<Violation>) {
    let below = spec.min.is_some_and(|min| value < min);
    let above = spec.max.is_some_and(|max| value > max);
    if below || above {
        violations.push(Violation::OutOfRange {
            column: spec.name.clone(),
            row,
            value,
        });
    }
}

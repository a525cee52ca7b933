//! Data layer: record batches, schemas, sources, ingestion, validation.

pub mod batch;
pub mod drift;
pub mod ingest;
pub mod schema;
pub mod source;
pub mod validate;

pub use batch::RecordBatch;
pub use drift::ColumnDrift;
pub use ingest::{DatasetArtifact, Ingestor};
pub use schema::{ColumnKind, ColumnSpec, TableSchema, Violation};
pub use source::{CsvSource, JsonlSource, MemorySource, RecordSource, source_from_config};
pub use validate::{DatasetValidator, ValidationReport};

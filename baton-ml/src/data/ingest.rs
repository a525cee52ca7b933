//! Ingestion: fetch raw records, shuffle deterministically, split, persist.

use crate::data::batch::RecordBatch;
use crate::data::source::RecordSource;
use crate::error::PipelineError;
use baton_core::storage::{ObjectStore, put_json};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Handle to the persisted train/test partitions of one run.
///
/// The partitions are disjoint and together reconstruct the ingested set
/// exactly; no stage re-reads the raw source after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetArtifact {
    pub run_id: String,
    pub train_key: String,
    pub test_key: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub columns: Vec<String>,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

/// Compute a SHA-256 hex digest of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// The ingestion stage.
pub struct Ingestor {
    store: Arc<dyn ObjectStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Pull all records, shuffle with the seeded RNG, split at the ratio
    /// boundary, and persist both partitions under the run's key prefix.
    pub async fn ingest(
        &self,
        source: &dyn RecordSource,
        split_ratio: f64,
        seed: u64,
        run_id: &str,
    ) -> Result<DatasetArtifact, PipelineError> {
        if !(split_ratio > 0.0 && split_ratio < 1.0) {
            return Err(PipelineError::ingestion(format!(
                "split_ratio must be in (0, 1), got {split_ratio}"
            )));
        }

        let info = source.source_info();
        let batch = source.fetch_all().await?;
        if batch.is_empty() {
            return Err(PipelineError::ingestion(format!(
                "source {} ({}) returned no records",
                info.kind, info.location
            )));
        }
        let total = batch.row_count();
        if total < 2 {
            return Err(PipelineError::ingestion(
                "need at least 2 records to split into train and test",
            ));
        }

        let content_hash = hash_bytes(&serde_json::to_vec(&batch)?);

        let mut rows = batch.rows;
        let mut rng = StdRng::seed_from_u64(seed);
        rows.shuffle(&mut rng);

        let train_len = ((total as f64) * split_ratio).round() as usize;
        let train_len = train_len.clamp(1, total - 1);
        let test_rows_vec = rows.split_off(train_len);

        let train = RecordBatch::new(batch.columns.clone(), rows);
        let test = RecordBatch::new(batch.columns.clone(), test_rows_vec);

        let train_key = format!("runs/{run_id}/data/train.json");
        let test_key = format!("runs/{run_id}/data/test.json");
        put_json(self.store.as_ref(), &train_key, &train).await?;
        put_json(self.store.as_ref(), &test_key, &test).await?;

        tracing::info!(
            source = %info.kind,
            rows = total,
            train = train.row_count(),
            test = test.row_count(),
            "ingested dataset"
        );

        Ok(DatasetArtifact {
            run_id: run_id.to_string(),
            train_key,
            test_key,
            train_rows: train.row_count(),
            test_rows: test.row_count(),
            columns: batch.columns,
            content_hash,
            ingested_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::MemorySource;
    use baton_core::LocalStore;
    use baton_core::storage::get_json;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn records(n: usize) -> RecordBatch {
        RecordBatch::new(
            vec!["id".into(), "age".into()],
            (0..n)
                .map(|i| vec![serde_json::json!(i), serde_json::json!(20 + (i % 60))])
                .collect(),
        )
    }

    fn ids(batch: &RecordBatch) -> HashSet<i64> {
        batch
            .rows
            .iter()
            .map(|row| row[0].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_split_is_exact_and_disjoint() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store.clone());
        let source = MemorySource::new(records(100));

        let artifact = ingestor.ingest(&source, 0.8, 42, "run-1").await.unwrap();
        assert_eq!(artifact.train_rows, 80);
        assert_eq!(artifact.test_rows, 20);

        let train: RecordBatch = get_json(store.as_ref(), &artifact.train_key).await.unwrap();
        let test: RecordBatch = get_json(store.as_ref(), &artifact.test_key).await.unwrap();

        let train_ids = ids(&train);
        let test_ids = ids(&test);
        assert!(train_ids.is_disjoint(&test_ids));

        let mut all: HashSet<i64> = train_ids;
        all.extend(test_ids);
        assert_eq!(all, (0..100).collect::<HashSet<i64>>());
    }

    #[tokio::test]
    async fn test_split_is_deterministic_for_seed() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store.clone());
        let source = MemorySource::new(records(50));

        let a = ingestor.ingest(&source, 0.8, 42, "run-a").await.unwrap();
        let b = ingestor.ingest(&source, 0.8, 42, "run-b").await.unwrap();

        let train_a: RecordBatch = get_json(store.as_ref(), &a.train_key).await.unwrap();
        let train_b: RecordBatch = get_json(store.as_ref(), &b.train_key).await.unwrap();
        assert_eq!(train_a, train_b);

        let c = ingestor.ingest(&source, 0.8, 7, "run-c").await.unwrap();
        let train_c: RecordBatch = get_json(store.as_ref(), &c.train_key).await.unwrap();
        assert_ne!(train_a.rows, train_c.rows);
    }

    #[tokio::test]
    async fn test_empty_source_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store);
        let source = MemorySource::new(RecordBatch::empty());

        let err = ingestor.ingest(&source, 0.8, 42, "run-1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion(_)));
    }

    #[tokio::test]
    async fn test_bad_split_ratio_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store);
        let source = MemorySource::new(records(10));

        for ratio in [0.0, 1.0, 1.5, -0.2] {
            let err = ingestor
                .ingest(&source, ratio, 42, "run-1")
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::Ingestion(_)), "ratio {ratio}");
        }
    }

    #[tokio::test]
    async fn test_content_hash_ignores_seed() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store);
        let source = MemorySource::new(records(20));

        let a = ingestor.ingest(&source, 0.5, 1, "run-a").await.unwrap();
        let b = ingestor.ingest(&source, 0.5, 2, "run-b").await.unwrap();
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_hash_bytes_is_stable() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
        assert_eq!(hash_bytes(b"abc").len(), 64);
    }

    #[tokio::test]
    async fn test_partitions_never_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()));
        let ingestor = Ingestor::new(store);
        let source = MemorySource::new(records(3));

        // An extreme ratio still leaves at least one row on each side.
        let artifact = ingestor.ingest(&source, 0.99, 42, "run-1").await.unwrap();
        assert_eq!(artifact.train_rows, 2);
        assert_eq!(artifact.test_rows, 1);
    }
}

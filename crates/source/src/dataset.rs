//! Read-only static catalog used when the live source cannot serve.

use catalogflow_model::{CanonicalRecord, CatalogSource};
use catalogflow_normalize::normalize_batch;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset must be an array or an object with a `products` array")]
    Shape,
}

/// Static dataset, normalized once at load and never mutated.
///
/// Shared between services as `Arc<StaticDataset>`.
#[derive(Debug, Clone, Default)]
pub struct StaticDataset {
    records: Vec<CanonicalRecord>,
    dropped: usize,
}

impl StaticDataset {
    /// Build from records that are already canonical. Later duplicates of an
    /// id are dropped.
    pub fn from_records(records: impl IntoIterator<Item = CanonicalRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut dataset = Self::default();

        for record in records {
            if seen.insert(record.id.clone()) {
                dataset.records.push(record);
            } else {
                dataset.dropped += 1;
            }
        }

        dataset
    }

    /// Parse and normalize static-schema records.
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        let raw: Value = serde_json::from_str(json)?;

        let items = match raw {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("products") {
                Some(Value::Array(items)) => items,
                _ => return Err(DatasetError::Shape),
            },
            _ => return Err(DatasetError::Shape),
        };

        let batch = normalize_batch(&items, CatalogSource::Static);
        if batch.dropped > 0 {
            tracing::warn!(
                dropped = batch.dropped,
                kept = batch.records.len(),
                "Static dataset contained unusable records"
            );
        }

        Ok(Self {
            records: batch.records,
            dropped: batch.dropped,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dataset = Self::from_json_str(&content)?;
        tracing::info!(path = %path.display(), records = dataset.len(), "Loaded static dataset");
        Ok(dataset)
    }

    /// The sample catalog compiled into the crate.
    pub fn bundled() -> Result<Self, DatasetError> {
        Self::from_json_str(BUNDLED_CATALOG)
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records rejected while loading.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

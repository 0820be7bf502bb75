//! Recently-viewed history.
//!
//! A bounded, most-recent-first list of canonical records, deduplicated by id.
//! The cache is the only shared mutable state in the core, so every access
//! goes through a per-instance lock.
//!
//! Persistence is optional: integrators that want the history to survive a
//! restart pass a [`HistoryStore`] to [`RecentlyViewed::restore`] and
//! [`RecentlyViewed::persist`]. The cache never touches storage on its own.

use catalogflow_model::CanonicalRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("History store contents are invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bounded recency-ordered history of viewed records.
#[derive(Debug)]
pub struct RecentlyViewed {
    capacity: usize,
    entries: Mutex<VecDeque<Arc<CanonicalRecord>>>,
}

impl Default for RecentlyViewed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecentlyViewed {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a view: move (or insert) the item to the front, evicting the
    /// least recently recorded entry when full.
    pub fn record(&self, item: CanonicalRecord) {
        let mut entries = self.entries.lock();

        entries.retain(|entry| entry.id != item.id);
        entries.push_front(Arc::new(item));
        entries.truncate(self.capacity);
    }

    /// Snapshot, most recent first. Changing the returned list does not
    /// affect the cache.
    pub fn list(&self) -> Vec<CanonicalRecord> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.as_ref().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Replace the contents with what `store` holds. Duplicates and entries
    /// past capacity are dropped, keeping the earliest (most recent) ones.
    pub fn restore(&self, store: &impl HistoryStore) -> Result<usize, HistoryError> {
        let saved = store.load()?;

        let mut restored: VecDeque<Arc<CanonicalRecord>> = VecDeque::with_capacity(self.capacity);
        for record in saved {
            if restored.len() == self.capacity {
                break;
            }
            if restored.iter().all(|entry| entry.id != record.id) {
                restored.push_back(Arc::new(record));
            }
        }

        let count = restored.len();
        *self.entries.lock() = restored;
        tracing::debug!(count, "Restored recently viewed history");
        Ok(count)
    }

    /// Write the current snapshot to `store`.
    pub fn persist(&self, store: &impl HistoryStore) -> Result<(), HistoryError> {
        let snapshot = self.list();
        store.save(&snapshot)
    }
}

/// Storage for history snapshots, supplied by the integrating system.
pub trait HistoryStore {
    /// Load a snapshot, most recent first. A missing snapshot is empty.
    fn load(&self) -> Result<Vec<CanonicalRecord>, HistoryError>;

    /// Replace the stored snapshot.
    fn save(&self, records: &[CanonicalRecord]) -> Result<(), HistoryError>;
}

/// Keeps the snapshot as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<CanonicalRecord>, HistoryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, records: &[CanonicalRecord]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

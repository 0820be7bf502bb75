//! Canonical id to live source key mapping.
//!
//! Live records are keyed by a hash of the backend's own primary key, which
//! the backend has never seen. Every live record the service normalizes is
//! remembered here so a later lookup by canonical id can ask the backend for
//! the key it actually knows.

use catalogflow_model::CanonicalRecord;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Default number of remembered keys.
pub const DEFAULT_KEY_CAPACITY: usize = 4096;

/// Bounded canonical id → source key index. Oldest entries are evicted first.
#[derive(Debug)]
pub struct LiveKeyIndex {
    capacity: usize,
    inner: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    keys: HashMap<String, String>,
    order: VecDeque<String>,
}

impl Default for LiveKeyIndex {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_CAPACITY)
    }
}

impl LiveKeyIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Entries::default()),
        }
    }

    /// Remember where each record came from.
    pub fn remember<'a>(&self, records: impl IntoIterator<Item = &'a CanonicalRecord>) {
        let mut entries = self.inner.lock();

        for record in records {
            if record.source_key.is_empty() {
                continue;
            }
            let previous = entries
                .keys
                .insert(record.id.clone(), record.source_key.clone());
            if previous.is_none() {
                entries.order.push_back(record.id.clone());
            }
        }

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.keys.remove(&oldest);
            }
        }
    }

    /// Source key the live backend uses for a canonical id, if seen.
    pub fn source_key(&self, canonical_id: &str) -> Option<String> {
        self.inner.lock().keys.get(canonical_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, source_key: &str) -> CanonicalRecord {
        CanonicalRecord {
            source_key: source_key.to_string(),
            ..CanonicalRecord::new(id, "Item")
        }
    }

    #[test]
    fn test_remember_and_lookup() {
        let index = LiveKeyIndex::default();
        index.remember(&[record("c1", "s1"), record("c2", "s2")]);

        assert_eq!(index.source_key("c1").as_deref(), Some("s1"));
        assert_eq!(index.source_key("c2").as_deref(), Some("s2"));
        assert_eq!(index.source_key("c3"), None);
    }

    #[test]
    fn test_evicts_oldest() {
        let index = LiveKeyIndex::new(2);
        index.remember(&[record("c1", "s1"), record("c2", "s2")]);
        index.remember(&[record("c3", "s3")]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.source_key("c1"), None);
        assert_eq!(index.source_key("c3").as_deref(), Some("s3"));
    }

    #[test]
    fn test_refresh_keeps_position() {
        let index = LiveKeyIndex::new(2);
        index.remember(&[record("c1", "s1"), record("c2", "s2")]);
        index.remember(&[record("c1", "s1b")]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.source_key("c1").as_deref(), Some("s1b"));
    }

    #[test]
    fn test_skips_records_without_source_key() {
        let index = LiveKeyIndex::default();
        index.remember(&[record("c1", "")]);
        assert!(index.is_empty());
    }
}

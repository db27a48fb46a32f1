use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

struct Entry<T> {
    value: T,
    recorded_at: DateTime<Utc>,
}

/// One-shot results of metadata lookups, keyed by the request that made them.
///
/// Each entry is written once and removed by the first read.
pub struct MetadataCache<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T> MetadataCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store the outcome for `request_id`. An existing entry is kept.
    pub fn record(&self, request_id: &str, value: T) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(request_id) {
            return false;
        }
        entries.insert(
            request_id.to_string(),
            Entry {
                value,
                recorded_at: Utc::now(),
            },
        );
        true
    }

    pub fn take(&self, request_id: &str) -> Option<T> {
        self.entries.lock().remove(request_id).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop entries that were never collected, recorded before `cutoff`
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.recorded_at >= cutoff);
        before - entries.len()
    }
}

impl<T> Default for MetadataCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_write_once_read_once() {
        let cache = MetadataCache::new();
        assert!(cache.record("req-1", "first"));
        assert!(!cache.record("req-1", "second"));

        assert_eq!(cache.take("req-1"), Some("first"));
        assert_eq!(cache.take("req-1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prune_uncollected() {
        let cache = MetadataCache::new();
        cache.record("a", 1);
        cache.record("b", 2);

        assert_eq!(cache.prune_before(Utc::now() - TimeDelta::hours(1)), 0);
        assert_eq!(cache.prune_before(Utc::now() + TimeDelta::seconds(1)), 2);
        assert_eq!(cache.len(), 0);
    }
}

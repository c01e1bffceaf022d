//! Dedup cache: remembers which payloads the endpoint has already marked as paid.
//!
//! State is held in memory for a single run. Readers share the lock; a write
//! excludes everyone. Entries only ever move from `false` to `true`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Per-payload lock used when dedup must be strict.
pub type InFlightLock = Arc<tokio::sync::Mutex<()>>;

/// Shared payload → paid map.
#[derive(Debug, Default)]
pub struct DedupCache {
    entries: RwLock<HashMap<String, bool>>,
    in_flight: Mutex<HashMap<String, InFlightLock>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has been acknowledged as paid. Absent keys read as `false`
    /// and are not inserted.
    pub fn get(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).copied().unwrap_or(false)
    }

    /// Record the acknowledgment state for `key`.
    ///
    /// A key that is already `true` stays `true`.
    pub fn set(&self, key: &str, paid: bool) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.to_string()).or_insert(false);
        if paid && !*entry {
            tracing::debug!(payload = key, "Payload acknowledged as paid");
        }
        *entry |= paid;
    }

    /// Insert `key` as unpaid if it is not tracked yet. Returns `true` if inserted.
    pub fn seed(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), false);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(key)
    }

    /// Number of tracked payloads.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of payloads acknowledged as paid so far.
    pub fn paid_count(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|paid| **paid).count()
    }

    /// Lock serialising check, call and write for one payload.
    ///
    /// All callers asking for the same key get the same lock.
    pub fn in_flight_guard(&self, key: &str) -> InFlightLock {
        let mut locks = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_reads_false_without_inserting() {
        let cache = DedupCache::new();
        assert!(!cache.get("payload"));
        assert!(!cache.contains("payload"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_seed_only_inserts_once() {
        let cache = DedupCache::new();
        assert!(cache.seed("payload"));
        assert!(!cache.seed("payload"));
        assert_eq!(cache.len(), 1);
        assert!(!cache.get("payload"));
    }

    #[test]
    fn test_seed_does_not_reset_paid() {
        let cache = DedupCache::new();
        cache.set("payload", true);
        assert!(!cache.seed("payload"));
        assert!(cache.get("payload"));
    }

    #[test]
    fn test_set_true_is_never_reverted() {
        let cache = DedupCache::new();
        cache.seed("payload");
        cache.set("payload", true);
        cache.set("payload", false);
        assert!(cache.get("payload"));
    }

    #[test]
    fn test_set_false_keeps_unpaid() {
        let cache = DedupCache::new();
        cache.seed("payload");
        cache.set("payload", false);
        assert!(!cache.get("payload"));
        assert_eq!(cache.paid_count(), 0);
    }

    #[test]
    fn test_independent_keys() {
        let cache = DedupCache::new();
        cache.seed("a");
        cache.seed("b");
        cache.set("a", true);
        assert!(cache.get("a"));
        assert!(!cache.get("b"));
        assert_eq!(cache.paid_count(), 1);
    }

    #[test]
    fn test_concurrent_writers_converge_to_paid() {
        let cache = Arc::new(DedupCache::new());
        cache.seed("payload");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache.set("payload", i % 4 == 0);
                    cache.get("payload")
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.get("payload"));
    }

    #[test]
    fn test_in_flight_guard_is_shared_per_key() {
        let cache = DedupCache::new();
        let a1 = cache.in_flight_guard("a");
        let a2 = cache.in_flight_guard("a");
        let b = cache.in_flight_guard("b");
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }

    #[tokio::test]
    async fn test_in_flight_guard_excludes() {
        let cache = DedupCache::new();
        let lock = cache.in_flight_guard("a");
        let _held = lock.lock().await;
        assert!(cache.in_flight_guard("a").try_lock().is_err());
        assert!(cache.in_flight_guard("b").try_lock().is_ok());
    }
}

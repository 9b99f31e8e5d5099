//! TTL cache for query results.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Key-value cache with a fixed TTL. Expired entries are swept lazily on
/// writes and evicted on reads; there is no background task.
///
/// A plain mutex is deliberate: writes are rare relative to reads and the
/// critical sections are a clone and a map insert.
pub struct QueryCache<V: Clone> {
    entries: Mutex<HashMap<String, (V, Instant)>>,
    ttl: Duration,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Build a cache key from the operation name and its normalized args.
    pub fn key(operation: &str, args: &[&str]) -> String {
        format!("{operation}:{}", args.join("|"))
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: V) {
        let mut entries = self.entries.lock();
        entries.insert(key, (value, Instant::now()));
        let ttl = self.ttl;
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache: QueryCache<Vec<i32>> = QueryCache::new(Duration::from_secs(600));
        cache.put(QueryCache::<Vec<i32>>::key("op", &["a", "0.8"]), vec![1, 2]);
        assert_eq!(
            cache.get(&QueryCache::<Vec<i32>>::key("op", &["a", "0.8"])),
            Some(vec![1, 2])
        );
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache: QueryCache<Vec<i32>> = QueryCache::new(Duration::from_millis(0));
        cache.put("k".to_string(), vec![1]);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn writes_sweep_expired_entries() {
        let cache: QueryCache<Vec<i32>> = QueryCache::new(Duration::from_millis(0));
        cache.put("old".to_string(), vec![1]);
        cache.put("new".to_string(), vec![2]);
        // The zero-TTL sweep on the second write removes the first entry
        // (and possibly the second; either way nothing stale survives).
        assert!(cache.len() <= 1);
        assert_eq!(cache.get("old"), None);
    }

    #[test]
    fn distinct_args_get_distinct_keys() {
        let a = QueryCache::<()>::key("entity_relations", &["数组", "0.8"]);
        let b = QueryCache::<()>::key("entity_relations", &["数组", "0.9"]);
        assert_ne!(a, b);
    }
}

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Value paired with its absolute expiry instant.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Generic mapping with per-entry expiry. Expiry is lazy: an expired entry
/// found during `get` is evicted on the spot, so no background sweeper is
/// needed for correctness. `clean` exists only to bound memory if a caller
/// wants a periodic sweep.
///
/// One mutex over the backing map is enough here; the operation rate is a
/// handful of credential lookups per publish cycle.
#[derive(Debug, Default)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the entry, expiring `ttl` from now.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };

        let mut map = self.entries.lock().unwrap();
        map.insert(key, entry);
    }

    /// Returns the stored value if present and unexpired. An expired entry is
    /// removed as a side effect and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut map = self.entries.lock().unwrap();

        match map.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Removes all currently-expired entries.
    pub fn clean(&self) {
        let now = Instant::now();
        let mut map = self.entries.lock().unwrap();
        map.retain(|_, entry| now < entry.expires_at);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn get_before_expiry() {
        let cache: TtlCache<String, String> = TtlCache::new();
        cache.set("k".to_string(), "v".to_string(), Duration::from_secs(60));

        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));
    }

    #[test]
    fn get_after_expiry_misses_and_evicts() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("k".to_string(), 7, Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get(&"k".to_string()), None);
        // eviction happened on the first miss; no resurrection on a second get
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("k".to_string(), 1, Duration::from_secs(60));
        cache.set("k".to_string(), 2, Duration::from_secs(60));

        assert_eq!(cache.get(&"k".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clean_removes_only_expired() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new();
        cache.set("short", 1, Duration::from_millis(10));
        cache.set("long", 2, Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(20));
        cache.clean();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"long"), Some(2));
    }
}

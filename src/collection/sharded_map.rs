//! # Sharded Concurrent Map
//!
//! Keyed mapping split across a fixed number of shards, each guarded by its
//! own mutex. The caller supplies the hash function, so keys that must
//! serialize with each other (all visibility messages of one workflow) can be
//! routed onto the same shard. There are no cross-shard transactions:
//! `contains` followed by `put` is not atomic as a pair.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

type HashFn<K> = Box<dyn Fn(&K) -> u32 + Send + Sync>;

/// Fixed-shard concurrent map with a caller-supplied shard hash.
pub struct ShardedConcurrentMap<K, V> {
    shards: Vec<Mutex<HashMap<K, V>>>,
    hasher: HashFn<K>,
}

impl<K: Eq + Hash, V> ShardedConcurrentMap<K, V> {
    /// Create a map with `shard_count` shards. The hash function picks the
    /// shard; its result is reduced modulo `shard_count`.
    pub fn new(shard_count: usize, hasher: impl Fn(&K) -> u32 + Send + Sync + 'static) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Mutex::new(HashMap::new()));
        }
        Self {
            shards,
            hasher: Box::new(hasher),
        }
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, V>> {
        let idx = (self.hasher)(key) as usize % self.shards.len();
        &self.shards[idx]
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key)
            .lock()
            .map(|shard| shard.contains_key(key))
            .unwrap_or(false)
    }

    /// Insert `value`, returning the previous value for the key if any.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.shard(&key)
            .lock()
            .map(|mut shard| shard.insert(key, value))
            .unwrap_or(None)
    }

    /// Remove and return the value for `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard(key)
            .lock()
            .map(|mut shard| shard.remove(key))
            .unwrap_or(None)
    }

    /// Read through the value for `key` without removing it.
    pub fn with_value<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.shard(key)
            .lock()
            .ok()
            .and_then(|shard| shard.get(key).map(f))
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().map(|s| s.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> std::fmt::Debug for ShardedConcurrentMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedConcurrentMap")
            .field("shard_count", &self.shards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn string_hash(key: &String) -> u32 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as u32
    }

    #[test]
    fn put_get_remove_round_trip() {
        let map: ShardedConcurrentMap<String, i64> = ShardedConcurrentMap::new(16, string_hash);

        assert!(!map.contains(&"a".to_string()));
        assert_eq!(map.put("a".to_string(), 1), None);
        assert!(map.contains(&"a".to_string()));
        assert_eq!(map.with_value(&"a".to_string(), |v| *v), Some(1));

        assert_eq!(map.put("a".to_string(), 2), Some(1));
        assert_eq!(map.remove(&"a".to_string()), Some(2));
        assert_eq!(map.remove(&"a".to_string()), None);
        assert!(map.is_empty());
    }

    #[test]
    fn all_keys_land_in_bounds_with_degenerate_hash() {
        // A constant hash routes everything onto one shard; operations must
        // still behave.
        let map: ShardedConcurrentMap<String, i64> = ShardedConcurrentMap::new(8, |_| u32::MAX);
        for i in 0..100 {
            map.put(format!("key-{i}"), i);
        }
        assert_eq!(map.len(), 100);
    }

    #[test]
    fn concurrent_access_across_threads() {
        let map: Arc<ShardedConcurrentMap<String, usize>> =
            Arc::new(ShardedConcurrentMap::new(32, string_hash));

        let mut handles = Vec::new();
        for t in 0..8 {
            let map = map.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    map.put(format!("{t}-{i}"), i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 800);
    }
}

//! Striped concurrent dictionary.
//!
//! Keys are spread over a fixed number of shards, each guarded by its own
//! mutex. Per-key operations are linearizable; `for_each` observes each
//! shard atomically but not a global snapshot, which is all the command
//! layer requires. None of the operations suspend.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use rand::seq::SliceRandom;

const SHARD_COUNT: usize = 16;

pub struct Dict<V> {
    shards: Vec<Mutex<HashMap<String, V>>>,
}

impl<V> Default for Dict<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Dict<V> {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(Mutex::new(HashMap::new()));
        }
        Dict { shards }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    fn lock(shard: &Mutex<HashMap<String, V>>) -> std::sync::MutexGuard<'_, HashMap<String, V>> {
        shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` over the value at `key`, if present.
    pub fn get<R>(&self, key: &str, f: impl FnOnce(&V) -> R) -> Option<R> {
        let guard = Self::lock(self.shard(key));
        guard.get(key).map(f)
    }

    pub fn contains(&self, key: &str) -> bool {
        Self::lock(self.shard(key)).contains_key(key)
    }

    /// Insert or replace; returns 1 if the key was newly inserted.
    pub fn put(&self, key: &str, val: V) -> usize {
        let mut guard = Self::lock(self.shard(key));
        match guard.insert(key.to_string(), val) {
            Some(_) => 0,
            None => 1,
        }
    }

    pub fn put_if_absent(&self, key: &str, val: V) -> usize {
        let mut guard = Self::lock(self.shard(key));
        if guard.contains_key(key) {
            return 0;
        }
        guard.insert(key.to_string(), val);
        1
    }

    pub fn put_if_exists(&self, key: &str, val: V) -> usize {
        let mut guard = Self::lock(self.shard(key));
        if !guard.contains_key(key) {
            return 0;
        }
        guard.insert(key.to_string(), val);
        1
    }

    pub fn remove(&self, key: &str) -> usize {
        let mut guard = Self::lock(self.shard(key));
        match guard.remove(key) {
            Some(_) => 1,
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| Self::lock(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            Self::lock(shard).clear();
        }
    }

    /// Visit every entry; stop early when `f` returns false. Each shard is
    /// locked for the duration of its own visit only.
    pub fn for_each(&self, mut f: impl FnMut(&str, &V) -> bool) {
        for shard in &self.shards {
            let guard = Self::lock(shard);
            for (key, val) in guard.iter() {
                if !f(key, val) {
                    return;
                }
            }
        }
    }

    /// Up to `n` distinct keys, uniformly shuffled.
    pub fn random_distinct_keys(&self, n: usize) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        self.for_each(|key, _| {
            keys.push(key.to_string());
            true
        });
        keys.shuffle(&mut rand::rng());
        keys.truncate(n);
        keys
    }

    /// Atomic multi-step access to the shard holding `key`. This is the
    /// hook for get→mutate→remove sequences that must not interleave with
    /// other writers of the same key.
    pub fn with_shard<R>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, V>) -> R) -> R {
        let mut guard = Self::lock(self.shard(key));
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::Dict;

    #[test]
    fn test_put_semantics() {
        let dict: Dict<i32> = Dict::new();
        assert_eq!(dict.put("a", 1), 1);
        assert_eq!(dict.put("a", 2), 0);
        assert_eq!(dict.get("a", |v| *v), Some(2));

        assert_eq!(dict.put_if_absent("a", 3), 0);
        assert_eq!(dict.put_if_absent("b", 3), 1);
        assert_eq!(dict.put_if_exists("b", 4), 1);
        assert_eq!(dict.put_if_exists("c", 5), 0);
        assert!(!dict.contains("c"));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let dict: Dict<i32> = Dict::new();
        dict.put("x", 1);
        assert_eq!(dict.remove("x"), 1);
        assert_eq!(dict.remove("x"), 0);

        dict.put("y", 1);
        dict.put("z", 2);
        dict.clear();
        assert!(dict.is_empty());
    }

    #[test]
    fn test_for_each_early_stop() {
        let dict: Dict<i32> = Dict::new();
        for i in 0..32 {
            dict.put(&format!("key{i}"), i);
        }
        let mut seen = 0;
        dict.for_each(|_, _| {
            seen += 1;
            seen < 5
        });
        assert_eq!(seen, 5);
    }

    #[test]
    fn test_random_distinct_keys() {
        let dict: Dict<i32> = Dict::new();
        for i in 0..10 {
            dict.put(&format!("key{i}"), i);
        }
        let keys = dict.random_distinct_keys(4);
        assert_eq!(keys.len(), 4);
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4, "keys must be distinct");

        assert_eq!(dict.random_distinct_keys(100).len(), 10);
    }

    #[test]
    fn test_concurrent_writers() {
        use std::sync::Arc;

        let dict: Arc<Dict<usize>> = Arc::new(Dict::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let dict = Arc::clone(&dict);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    dict.put(&format!("t{t}-{i}"), i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(dict.len(), 800);
    }
}

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

const SHARD_COUNT: usize = 16;

/// Hash-sharded map used for the engine's hot state (history rings,
/// cooldown timestamps, active alerts).
///
/// Concurrent producers touching different keys contend only on their
/// shard's lock, never on one global lock.
pub(crate) struct ShardedMap<K, V> {
    shards: Vec<RwLock<HashMap<K, V>>>,
}

impl<K: Eq + Hash, V> ShardedMap<K, V> {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, key: &K) -> &RwLock<HashMap<K, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    pub fn get_clone(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let guard = self.shard(key).read().unwrap_or_else(|p| p.into_inner());
        guard.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        let guard = self.shard(key).read().unwrap_or_else(|p| p.into_inner());
        guard.contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut guard = self.shard(&key).write().unwrap_or_else(|p| p.into_inner());
        guard.insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.shard(key).write().unwrap_or_else(|p| p.into_inner());
        guard.remove(key)
    }

    /// Applies `f` to the value for `key`, inserting `default()` first if
    /// the key is unseen. The shard lock is held for the duration of `f`.
    pub fn update<R>(
        &self,
        key: K,
        default: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut guard = self.shard(&key).write().unwrap_or_else(|p| p.into_inner());
        f(guard.entry(key).or_insert_with(default))
    }

    /// Applies `f` to the value for `key` if present, returning its result.
    pub fn with_existing<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut guard = self.shard(key).write().unwrap_or_else(|p| p.into_inner());
        guard.get_mut(key).map(f)
    }

    /// Read-only variant of [`Self::with_existing`]; takes the shard's read
    /// lock so concurrent readers of one key do not serialize.
    pub fn read_with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let guard = self.shard(key).read().unwrap_or_else(|p| p.into_inner());
        guard.get(key).map(f)
    }

    /// Visits every entry across all shards under read locks.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for shard in &self.shards {
            let guard = shard.read().unwrap_or_else(|p| p.into_inner());
            for (k, v) in guard.iter() {
                f(k, v);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|p| p.into_inner()).len())
            .sum()
    }
}

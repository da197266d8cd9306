use crate::container::List;
use parking_lot::RwLock;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default bucket count. Prime, to spread keys whose hashes share factors.
pub const DEFAULT_BUCKETS: usize = 61;

/// Hash map with a fixed number of buckets, each a lock plus a
/// hand-over-hand [`List`] of key/value pairs.
///
/// Lookups take the bucket's lock shared; mutations take it exclusive. The
/// bucket count never changes, a key always hashes to the same bucket, and a
/// key appears at most once across the map. There is no cross-bucket
/// atomicity: [`len`] reads an atomic counter and can be stale relative to
/// another thread's view.
///
/// [`len`]: Map::len
pub struct Map<K, V, const N: usize = DEFAULT_BUCKETS> {
    buckets: [Bucket<K, V>; N],
    len: AtomicUsize,
}

struct Bucket<K, V> {
    entries: RwLock<List<Pair<K, V>>>,
}

struct Pair<K, V> {
    key: K,
    /// Shared-ownership pointer, so `get` hands out a value that stays alive
    /// across unrelated map mutations.
    value: Arc<V>,
}

impl<K: Clone, V> Clone for Pair<K, V> {
    fn clone(&self) -> Self {
        Pair {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<K, V, const N: usize> Map<K, V, N>
where
    K: Hash + Eq,
{
    pub fn new() -> Map<K, V, N> {
        const {
            assert!(N > 0, "a map needs at least one bucket");
        }

        Map {
            buckets: std::array::from_fn(|_| Bucket {
                entries: RwLock::new(List::new()),
            }),
            len: AtomicUsize::new(0),
        }
    }

    /// Adds a key/value pair. Returns false if the key is already present.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.insert_arc(key, Arc::new(value))
    }

    /// Overwrites the value of an existing key. Returns false if the key is
    /// absent.
    pub fn replace(&self, key: K, value: V) -> bool
    where
        K: Clone,
    {
        let entries = self.bucket(&key).entries.write();
        let value = Arc::new(value);

        // The supplier may be consulted more than zero times in principle;
        // cloning the Arc keeps it reusable.
        entries.replace_if(
            |pair| pair.key == key,
            || Pair {
                key: key.clone(),
                value: Arc::clone(&value),
            },
            1,
        ) > 0
    }

    /// Adds the pair, overwriting any existing value for the key.
    pub fn insert_or_replace(&self, key: K, value: V)
    where
        K: Clone,
    {
        let entries = self.bucket(&key).entries.write();
        let value = Arc::new(value);

        let replaced = entries.replace_if(
            |pair| pair.key == key,
            || Pair {
                key: key.clone(),
                value: Arc::clone(&value),
            },
            1,
        );

        if replaced == 0 {
            entries.push_front(Pair { key, value });
            self.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes the key. Returns false if it was absent.
    pub fn remove(&self, key: &K) -> bool {
        let entries = self.bucket(key).entries.write();

        if entries.remove_if(|pair| pair.key == *key, 1) > 0 {
            self.len.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Returns the value for the key, detached from the map: the `Arc` stays
    /// valid however the map mutates afterwards.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.bucket(key).entries.read();

        entries
            .find_first_if(|pair| pair.key == *key)
            .map(|pair| Arc::clone(&pair.value))
    }

    /// Returns the value for the key, inserting one from the supplier if the
    /// key is absent.
    ///
    /// Double-checked: an optimistic probe under the shared lock, then an
    /// exclusive re-check before inserting, so a racing inserter's value
    /// wins and the supplier runs at most once per inserted key.
    pub fn get_or_insert(&self, key: K, supplier: impl FnOnce() -> V) -> Arc<V> {
        if let Some(existing) = self.get(&key) {
            return existing;
        }

        let entries = self.bucket(&key).entries.write();

        // Re-check: the key may have been added between the probe above and
        // taking the exclusive lock.
        if let Some(pair) = entries.find_first_if(|pair| pair.key == key) {
            return Arc::clone(&pair.value);
        }

        let value = Arc::new(supplier());
        entries.push_front(Pair {
            key,
            value: Arc::clone(&value),
        });
        self.len.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Applies the mapper to the key's value under the bucket's shared lock.
    /// `None` when the key is absent.
    pub fn read_and_map<R>(&self, key: &K, mapper: impl FnOnce(&V) -> R) -> Option<R> {
        let entries = self.bucket(key).entries.read();
        entries.read_map_first_if(|pair| pair.key == *key, |pair| mapper(&pair.value))
    }

    /// Applies the mapper to the key's value, mutably, under the bucket's
    /// exclusive lock. `None` when the key is absent.
    pub fn write_and_map<R>(&self, key: &K, mapper: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Clone,
        V: Clone,
    {
        let entries = self.bucket(key).entries.write();
        entries.write_map_first_if(
            |pair| pair.key == *key,
            |pair| mapper(Arc::make_mut(&mut pair.value)),
        )
    }

    /// Applies the consumer to every pair, one bucket at a time, each under
    /// its own shared lock.
    pub fn read_each(&self, mut consumer: impl FnMut(&K, &V)) {
        for bucket in &self.buckets {
            let entries = bucket.entries.read();
            entries.read_each(|pair| consumer(&pair.key, &pair.value));
        }
    }

    /// Applies the consumer to every pair, mutably, one bucket at a time,
    /// each under its own exclusive lock.
    pub fn write_each(&self, mut consumer: impl FnMut(&K, &mut V))
    where
        K: Clone,
        V: Clone,
    {
        for bucket in &self.buckets {
            let entries = bucket.entries.write();
            entries.write_each(|pair| consumer(&pair.key, Arc::make_mut(&mut pair.value)));
        }
    }

    /// Checks whether the key is present.
    pub fn has(&self, key: &K) -> bool {
        let entries = self.bucket(key).entries.read();
        entries.match_any(|pair| pair.key == *key)
    }

    /// Empties the map.
    ///
    /// Takes every bucket's exclusive lock in bucket-index order (the one
    /// compound lock acquisition in the map, kept cycle-free by the fixed
    /// order), then clears each list.
    pub fn clear(&self) {
        let guards: Vec<_> = self.buckets.iter().map(|b| b.entries.write()).collect();
        for entries in &guards {
            entries.clear();
        }
        self.len.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_arc(&self, key: K, value: Arc<V>) -> bool {
        let entries = self.bucket(&key).entries.write();

        if entries.match_none(|pair| pair.key == key) {
            entries.push_front(Pair { key, value });
            self.len.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    fn bucket(&self, key: &K) -> &Bucket<K, V> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.buckets[hasher.finish() as usize % N]
    }
}

impl<K: Hash + Eq, V, const N: usize> Default for Map<K, V, N> {
    fn default() -> Map<K, V, N> {
        Map::new()
    }
}

//! Lookup cache for remote collections.
//!
//! Each entry holds a whole collection snapshot (`Vec<T>`) for one resource
//! type. Entries expire after a fixed TTL; past `max_size` keys the least
//! recently used entry is evicted. Collections are never mutated in place:
//! the typed helpers clone, modify and store a fresh snapshot, all under the
//! cache lock.

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

/// Default maximum number of cached keys.
pub const DEFAULT_CACHE_SIZE: usize = 70_000;

/// Default time-to-live of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

type Value = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: Value,
    written_at: Instant,
}

/// Thread-safe, type-erased collection cache.
pub struct LookupCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl LookupCache {
    /// Create a cache holding at most `max_size` keys. Zero selects
    /// [`DEFAULT_CACHE_SIZE`].
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size)
            .or(NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry under `key` unless it expired; an expired entry is dropped.
    fn live<'a>(&self, entries: &'a mut LruCache<String, Entry>, key: &str) -> Option<&'a Entry> {
        if entries.get(key)?.written_at.elapsed() >= self.ttl {
            debug!(key, "cache entry expired");
            entries.pop(key);
            return None;
        }
        entries.get(key)
    }

    /// Typed copy of the collection under `key`.
    fn snapshot<T>(&self, entries: &mut LruCache<String, Entry>, key: &str) -> Option<Vec<T>>
    where
        T: Any + Send + Sync + Clone,
    {
        self.live(entries, key)?.value.downcast_ref::<Vec<T>>().cloned()
    }

    fn put(entries: &mut LruCache<String, Entry>, key: &str, value: Value) {
        let entry = Entry {
            value,
            written_at: Instant::now(),
        };
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                debug!(key = %evicted, "cache entry evicted");
            }
        }
    }

    /// Get a raw value. Expired entries are dropped and reported as missing.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        self.live(&mut entries, key).map(|entry| Arc::clone(&entry.value))
    }

    /// Store a single value under `key`.
    pub fn set<V: Any + Send + Sync>(&self, key: &str, value: V) {
        Self::put(&mut self.lock(), key, Arc::new(value));
    }

    /// Store a collection snapshot under `key`.
    pub fn set_collection<T: Any + Send + Sync>(&self, key: &str, items: Vec<T>) {
        Self::put(&mut self.lock(), key, Arc::new(items));
    }

    pub fn delete(&self, key: &str) {
        self.lock().pop(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of live keys, including entries that expired but were not yet
    /// touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find<T, F>(&self, key: &str, matches: F) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
        F: Fn(&T) -> bool,
    {
        let mut entries = self.lock();
        let items = self.live(&mut entries, key)?.value.downcast_ref::<Vec<T>>()?;
        items.iter().find(|&item| matches(item)).cloned()
    }

    /// Find an item by name in the collection under `key`. `None` if the key
    /// is absent, expired, or holds a different type.
    pub fn find_by_name<T, F>(&self, key: &str, name: &str, get_name: F) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
        F: Fn(&T) -> &str,
    {
        self.find(key, |item: &T| get_name(item) == name)
    }

    /// Find an item by id in the collection under `key`.
    pub fn find_by_id<T, F>(&self, key: &str, id: &str, get_id: F) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
        F: Fn(&T) -> &str,
    {
        self.find(key, |item: &T| get_id(item) == id)
    }

    /// Append an item. A missing or mistyped collection is replaced by a new
    /// one holding only `item`.
    pub fn add_to_collection<T>(&self, key: &str, item: T)
    where
        T: Any + Send + Sync + Clone,
    {
        let mut entries = self.lock();
        let mut items = self.snapshot::<T>(&mut entries, key).unwrap_or_default();
        items.push(item);
        Self::put(&mut entries, key, Arc::new(items));
    }

    /// Replace the first item matching `matches`. No-op if the collection is
    /// missing, mistyped, or has no match.
    pub fn update_in_collection<T, F>(&self, key: &str, updated: T, matches: F)
    where
        T: Any + Send + Sync + Clone,
        F: Fn(&T) -> bool,
    {
        let mut entries = self.lock();
        let Some(mut items) = self.snapshot::<T>(&mut entries, key) else {
            return;
        };
        let Some(pos) = items.iter().position(&matches) else {
            return;
        };
        items[pos] = updated;
        Self::put(&mut entries, key, Arc::new(items));
    }

    /// Drop every item matching `matches`. No-op if the collection is missing
    /// or mistyped.
    pub fn remove_from_collection<T, F>(&self, key: &str, matches: F)
    where
        T: Any + Send + Sync + Clone,
        F: Fn(&T) -> bool,
    {
        let mut entries = self.lock();
        let Some(mut items) = self.snapshot::<T>(&mut entries, key) else {
            return;
        };
        items.retain(|item| !matches(item));
        Self::put(&mut entries, key, Arc::new(items));
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL)
    }
}

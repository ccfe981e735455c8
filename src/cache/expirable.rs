//! Expirable LRU Module
//!
//! Thread-safe cache handle: one mutex around the [`LruStore`], plus the
//! lifecycle of the optional background expiry sweep.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheStats, EvictCallback, LruStore};
use crate::config::CacheConfig;
use crate::tasks::{spawn_sweep_task, SweepHandle};

// == Expirable LRU ==
/// Bounded, thread-safe LRU cache with per-entry TTL.
///
/// Every operation takes a single cache-wide lock for its whole duration, so
/// operations never interleave. Share it between threads with an `Arc`.
///
/// # Expiry
/// Expired entries read as absent from [`get`](Self::get) and
/// [`peek`](Self::peek), but they are not removed on lookup. Until the
/// background sweep or [`delete_expired`](Self::delete_expired) reaps them
/// they still occupy capacity and are counted by [`len`](Self::len),
/// [`contains`](Self::contains) and [`keys`](Self::keys).
///
/// # Eviction callback
/// The callback runs synchronously under the cache lock, on whichever thread
/// caused the entry to leave (a caller or the sweep). It must not call back
/// into the same cache.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use expirable_lru::ExpirableLru;
///
/// let cache = ExpirableLru::new(2, None, Duration::from_secs(60), Duration::ZERO);
/// cache.add("a", 1);
/// cache.add("b", 2);
/// assert_eq!(cache.get(&"a"), Some(1));
/// assert!(cache.add("c", 3)); // evicts "b", the least recently used
/// assert_eq!(cache.keys(), vec!["a", "c"]);
/// cache.close();
/// ```
pub struct ExpirableLru<K, V> {
    store: Arc<Mutex<LruStore<K, V>>>,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl<K, V> ExpirableLru<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    // == Constructor ==
    /// Creates a cache.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unlimited
    /// * `on_evicted` - Optional callback for every entry that leaves the cache
    /// * `ttl` - Default TTL, zero for entries that never expire by default
    /// * `purge_interval` - Sweep period; see [`CacheConfig::sweep_interval`]
    ///   for when a sweep actually starts
    pub fn new(
        capacity: usize,
        on_evicted: Option<EvictCallback<K, V>>,
        ttl: Duration,
        purge_interval: Duration,
    ) -> Self {
        let config = CacheConfig::new()
            .with_capacity(capacity)
            .with_default_ttl(ttl)
            .with_purge_interval(purge_interval);
        Self::from_config(config, on_evicted)
    }

    /// Creates a cache from a [`CacheConfig`].
    ///
    /// If the sweep can't be started the cache still works; expired entries
    /// are then only reclaimed by explicit `delete_expired` calls or by
    /// capacity eviction.
    pub fn from_config(config: CacheConfig, on_evicted: Option<EvictCallback<K, V>>) -> Self {
        let store = Arc::new(Mutex::new(LruStore::new(
            config.capacity,
            config.default_ttl,
            on_evicted,
        )));

        let sweeper = config.sweep_interval().and_then(|interval| {
            spawn_sweep_task(Arc::downgrade(&store), interval)
                .map_err(|err| warn!("Expiry sweep not started: {}", err))
                .ok()
        });

        Self {
            store,
            sweeper: Mutex::new(sweeper),
        }
    }

    // == Add ==
    /// Adds a value with the default TTL. Returns true if the least recently
    /// used entry was evicted to make room.
    pub fn add(&self, key: K, value: V) -> bool {
        self.store.lock().add(key, value)
    }

    /// Adds a value that expires `ttl` from now. Returns true if the least
    /// recently used entry was evicted to make room.
    ///
    /// Unlike the default TTL, a zero `ttl` is taken literally: the entry is
    /// expired on the next lookup. Re-adding an existing key updates it in
    /// place and never evicts.
    pub fn add_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        self.store.lock().add_with_ttl(key, value, ttl)
    }

    // == Lookup ==
    /// Returns the value of a live key and marks it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.lock().get(key)
    }

    /// Returns the value of a live key without changing its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.lock().peek(key)
    }

    /// Returns true if the key is stored, even if it has expired.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().contains(key)
    }

    /// Returns the least recently used entry, without expiry check or
    /// reordering.
    pub fn get_oldest(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.store.lock().get_oldest()
    }

    /// Returns the remaining TTL of a stored key; `Some(None)` if it never
    /// expires.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Option<Duration>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().ttl_remaining(key)
    }

    /// Returns all keys from oldest to newest, expired ones included.
    pub fn keys(&self) -> Vec<K> {
        self.store.lock().keys()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.store.lock().capacity()
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    // == Removal ==
    /// Removes a key. Returns false if it was not present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().remove(key)
    }

    /// Removes and returns the least recently used entry, expired or not.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.store.lock().remove_oldest()
    }

    /// Removes every entry that has expired. Returns how many were removed.
    pub fn delete_expired(&self) -> usize {
        self.store.lock().delete_expired()
    }

    /// Removes every entry, firing the eviction callback for each.
    pub fn purge(&self) {
        let removed = self.store.lock().purge();
        debug!("Purged {} entries", removed);
    }

    /// Changes the capacity, evicting least recently used entries as needed.
    /// Returns the number evicted. A capacity of 0 is ignored.
    pub fn resize(&self, capacity: usize) -> usize {
        let evicted = self.store.lock().resize(capacity);
        debug!("Resized to {} entries, evicted {}", capacity, evicted);
        evicted
    }
}

impl<K, V> ExpirableLru<K, V> {
    // == Lifecycle ==
    /// Stops the background sweep.
    ///
    /// Safe to call more than once. The cache keeps working afterwards;
    /// expired entries are just no longer reclaimed in the background.
    pub fn close(&self) {
        match self.sweeper.lock().take() {
            Some(handle) => {
                debug!("Stopping expiry sweep");
                handle.stop();
            }
            None => debug!("Expiry sweep already stopped"),
        }
    }

    /// Returns true while the background sweep thread is alive.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .map_or(false, SweepHandle::is_running)
    }
}

impl<K, V> Drop for ExpirableLru<K, V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.stop();
        }
    }
}

impl<K, V> std::fmt::Debug for ExpirableLru<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirableLru")
            .field("store", &*self.store.lock())
            .field("sweeper", &*self.sweeper.lock())
            .finish()
    }
}

//! Cache Store Module
//!
//! Unlocked cache engine: a HashMap from key to list node, plus the ordered
//! entry list that tracks recency and expiry. Every method here assumes the
//! caller holds the cache lock; [`crate::ExpirableLru`] provides that.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, CacheStats, EntryList, NodeHandle};

/// Callback fired with the key and value of every entry leaving the cache.
///
/// It runs under the cache lock and must not call back into the cache.
pub type EvictCallback<K, V> = Box<dyn FnMut(&K, &V) + Send>;

/// Why an entry is leaving; decides which counter it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Evicted,
    Expired,
    Removed,
}

// == LRU Store ==
/// LRU store with per-entry expiration.
///
/// `items` and `list` are kept in bijection: a key is in the map exactly
/// when a node holding that key is in the list.
pub struct LruStore<K, V> {
    /// Key to list node index
    items: HashMap<K, NodeHandle>,
    /// Recency order, front = most recently used
    list: EntryList<CacheEntry<K, V>>,
    /// Maximum number of entries, 0 = unlimited
    capacity: usize,
    /// TTL used by `add`, None = never expire
    default_ttl: Option<Duration>,
    on_evicted: Option<EvictCallback<K, V>>,
    stats: CacheStats,
}

impl<K, V> LruStore<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unlimited
    /// * `default_ttl` - TTL applied by `add`, zero for entries that never expire
    /// * `on_evicted` - Optional callback for every entry that leaves the store
    ///
    /// Only the default TTL treats zero as "never"; a zero passed to
    /// [`LruStore::add_with_ttl`] expires right away.
    pub fn new(
        capacity: usize,
        default_ttl: Duration,
        on_evicted: Option<EvictCallback<K, V>>,
    ) -> Self {
        Self {
            items: HashMap::new(),
            list: EntryList::new(),
            capacity,
            default_ttl: (!default_ttl.is_zero()).then_some(default_ttl),
            on_evicted,
            stats: CacheStats::new(),
        }
    }

    // == Add ==
    /// Adds a value with the default TTL. Returns true if an entry was
    /// evicted to make room.
    pub fn add(&mut self, key: K, value: V) -> bool {
        self.insert(key, value, self.default_ttl)
    }

    /// Adds a value with an explicit TTL. Returns true if an entry was
    /// evicted to make room.
    ///
    /// An existing key is refreshed in place: new value, TTL restarted,
    /// moved to the front. A refresh never evicts. A new key that pushes the
    /// store past capacity evicts exactly one entry, the least recently used.
    ///
    /// The deadline is always `now + ttl`, so a zero `ttl` gives an entry
    /// that is already expired on the next lookup.
    pub fn add_with_ttl(&mut self, key: K, value: V, ttl: Duration) -> bool {
        self.insert(key, value, Some(ttl))
    }

    fn insert(&mut self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let now = Instant::now();

        if let Some(&handle) = self.items.get(&key) {
            self.list.move_to_front(handle);
            if let Some(entry) = self.list.get_mut(handle) {
                entry.refresh(value, ttl, now);
            }
            return false;
        }

        let handle = self
            .list
            .push_front(CacheEntry::new(key.clone(), value, ttl, now));
        self.items.insert(key, handle);

        if self.capacity > 0 && self.items.len() > self.capacity {
            self.remove_back(Departure::Evicted);
            return true;
        }
        false
    }

    // == Get ==
    /// Returns the value for a live key and marks it most recently used.
    ///
    /// Expired entries read as absent but are left in place; they are only
    /// reclaimed by [`LruStore::delete_expired`] or by capacity eviction.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        let live = self
            .items
            .get(key)
            .copied()
            .filter(|&handle| !self.is_expired(handle, now));

        match live {
            Some(handle) => {
                self.stats.record_hit();
                self.list.move_to_front(handle);
                self.list.get(handle).map(|entry| entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Peek ==
    /// Like [`LruStore::get`] but leaves the recency order untouched.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        let handle = *self.items.get(key)?;
        let entry = self.list.get(handle)?;
        if entry.is_expired_at(now) {
            return None;
        }
        Some(entry.value.clone())
    }

    // == Oldest ==
    /// Returns the least recently used entry without touching it. Expired
    /// entries are returned too.
    pub fn get_oldest(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        let entry = self.list.get(self.list.back()?)?;
        Some((entry.key.clone(), entry.value.clone()))
    }

    /// Removes and returns the least recently used entry, expired or not.
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        self.remove_back(Departure::Removed)
    }

    // == Contains ==
    /// Checks map membership only: no expiry check, no reordering.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.items.contains_key(key)
    }

    // == Remove ==
    /// Removes a key. Returns false if it was not present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.items.get(key).copied() {
            Some(handle) => self.remove_node(handle, Departure::Removed).is_some(),
            None => false,
        }
    }

    // == Keys ==
    /// Returns all keys from oldest to newest, expired ones included.
    pub fn keys(&self) -> Vec<K> {
        self.list.iter().rev().map(|entry| entry.key.clone()).collect()
    }

    // == Delete Expired ==
    /// Removes every entry that has expired as of this call, oldest first.
    ///
    /// Returns the number of entries removed.
    pub fn delete_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut cursor = self.list.back();
        while let Some(handle) = cursor {
            if self.is_expired(handle, now) {
                expired.push(handle);
            }
            cursor = self.list.prev(handle);
        }

        let count = expired.len();
        for handle in expired {
            self.remove_node(handle, Departure::Expired);
        }
        count
    }

    // == Purge ==
    /// Removes every entry, oldest first, firing the callback for each.
    ///
    /// Returns the number of entries removed.
    pub fn purge(&mut self) -> usize {
        let mut count = 0;
        while self.remove_back(Departure::Removed).is_some() {
            count += 1;
        }
        self.items.clear();
        self.list.clear();
        count
    }

    // == Resize ==
    /// Changes the capacity, evicting least recently used entries until the
    /// store fits. Returns the number evicted.
    ///
    /// A capacity of 0 is ignored: an unlimited store can't be re-created by
    /// resizing.
    pub fn resize(&mut self, capacity: usize) -> usize {
        if capacity == 0 {
            return 0;
        }
        let excess = self.list.len().saturating_sub(capacity);
        for _ in 0..excess {
            self.remove_back(Departure::Evicted);
        }
        self.capacity = capacity;
        excess
    }

    // == Length ==
    /// Returns the number of entries, including expired ones not yet reaped.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the TTL used by `add`, or None if those entries never expire.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Returns the remaining TTL of a present key.
    ///
    /// `Some(None)` means the entry never expires.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Option<Duration>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let handle = *self.items.get(key)?;
        self.list.get(handle).map(CacheEntry::ttl_remaining)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.items.len());
        stats
    }

    // == Internals ==
    fn is_expired(&self, handle: NodeHandle, now: Instant) -> bool {
        self.list
            .get(handle)
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(false)
    }

    fn remove_back(&mut self, reason: Departure) -> Option<(K, V)> {
        let handle = self.list.back()?;
        self.remove_node(handle, reason)
    }

    /// Unlinks a node from both structures, then fires the callback. Both
    /// removals happen first so a panicking callback can't break the
    /// bijection.
    fn remove_node(&mut self, handle: NodeHandle, reason: Departure) -> Option<(K, V)> {
        let entry = self.list.remove(handle)?;
        self.items.remove(&entry.key);

        match reason {
            Departure::Evicted => self.stats.record_eviction(),
            Departure::Expired => self.stats.record_expiration(),
            Departure::Removed => self.stats.record_removal(),
        }

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(&entry.key, &entry.value);
        }
        Some((entry.key, entry.value))
    }

    /// Checks the map/list bijection and the list ring.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.list.assert_consistent();
        assert_eq!(self.items.len(), self.list.len());
        for (key, &handle) in &self.items {
            let entry = self.list.get(handle).expect("map points at a dead node");
            assert!(entry.key == *key, "map points at a node with another key");
        }
        if self.capacity > 0 {
            assert!(self.items.len() <= self.capacity);
        }
    }
}

impl<K, V> fmt::Debug for LruStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.list.len())
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("has_on_evicted", &self.on_evicted.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread::sleep;

    const LONG_TTL: Duration = Duration::from_secs(300);

    type Log = Arc<Mutex<Vec<(String, u32)>>>;

    fn recording_store(capacity: usize, ttl: Duration) -> (LruStore<String, u32>, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let store = LruStore::new(
            capacity,
            ttl,
            Some(Box::new(move |k: &String, v: &u32| {
                sink.lock().unwrap().push((k.clone(), *v))
            })),
        );
        (store, log)
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_store_new() {
        let store: LruStore<String, u32> = LruStore::new(100, LONG_TTL, None);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 100);
        assert_eq!(store.default_ttl(), Some(LONG_TTL));
    }

    #[test]
    fn test_store_add_and_get() {
        let mut store = LruStore::new(100, LONG_TTL, None);

        assert!(!store.add(key("key1"), 1));
        assert_eq!(store.get("key1"), Some(1));
        assert_eq!(store.len(), 1);
        store.assert_invariants();
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store: LruStore<String, u32> = LruStore::new(100, LONG_TTL, None);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_capacity_eviction_order() {
        let (mut store, log) = recording_store(2, LONG_TTL);

        assert!(!store.add(key("a"), 1));
        assert!(!store.add(key("b"), 2));
        assert!(store.add(key("c"), 3));

        assert_eq!(store.keys(), vec![key("b"), key("c")]);
        assert_eq!(*log.lock().unwrap(), vec![(key("a"), 1)]);
        assert_eq!(store.stats().evictions, 1);
        store.assert_invariants();
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let mut store = LruStore::new(2, LONG_TTL, None);

        store.add(key("a"), 1);
        store.add(key("b"), 2);
        assert_eq!(store.get("a"), Some(1));
        assert!(store.add(key("c"), 3));

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert_eq!(store.keys(), vec![key("a"), key("c")]);
    }

    #[test]
    fn test_peek_does_not_reorder() {
        let mut store = LruStore::new(2, LONG_TTL, None);

        store.add(key("a"), 1);
        store.add(key("b"), 2);
        assert_eq!(store.peek("a"), Some(1));
        store.add(key("c"), 3);

        assert!(!store.contains("a"));
    }

    #[test]
    fn test_refresh_never_evicts() {
        let (mut store, log) = recording_store(2, LONG_TTL);

        store.add(key("a"), 1);
        store.add(key("b"), 2);
        assert!(!store.add(key("a"), 10));

        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), vec![key("b"), key("a")]);
        assert_eq!(store.peek("a"), Some(10));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_revives_expired_entry() {
        let mut store = LruStore::new(0, Duration::from_millis(10), None);

        store.add(key("a"), 1);
        sleep(Duration::from_millis(15));
        assert_eq!(store.get("a"), None);

        assert!(!store.add(key("a"), 2));
        assert_eq!(store.get("a"), Some(2));
    }

    #[test]
    fn test_ttl_expiry_is_lazy() {
        let mut store = LruStore::new(0, LONG_TTL, None);

        store.add_with_ttl(key("short"), 1, Duration::from_millis(10));
        store.add(key("long"), 2);
        sleep(Duration::from_millis(15));

        assert_eq!(store.get("short"), None);
        assert_eq!(store.peek("short"), None);
        assert!(store.contains("short"), "expired entries stay until reaped");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("long"), Some(2));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_delete_expired() {
        let (mut store, log) = recording_store(0, LONG_TTL);

        store.add_with_ttl(key("a"), 1, Duration::from_millis(10));
        store.add(key("b"), 2);
        store.add_with_ttl(key("c"), 3, Duration::from_millis(10));
        sleep(Duration::from_millis(15));

        assert_eq!(store.delete_expired(), 2);
        assert_eq!(store.keys(), vec![key("b")]);
        assert_eq!(*log.lock().unwrap(), vec![(key("a"), 1), (key("c"), 3)]);
        assert_eq!(store.stats().expirations, 2);
        store.assert_invariants();
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let mut store = LruStore::new(0, Duration::ZERO, None);
        store.add(key("a"), 1);
        sleep(Duration::from_millis(5));

        assert_eq!(store.delete_expired(), 0);
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.ttl_remaining("a"), Some(None));
    }

    #[test]
    fn test_zero_per_call_ttl_expires() {
        let (mut store, log) = recording_store(0, LONG_TTL);

        store.add_with_ttl(key("z"), 1, Duration::ZERO);
        sleep(Duration::from_millis(5));

        assert_eq!(store.get("z"), None);
        assert_eq!(store.ttl_remaining("z"), Some(Some(Duration::ZERO)));
        assert_eq!(store.delete_expired(), 1);
        assert_eq!(*log.lock().unwrap(), vec![(key("z"), 1)]);
        store.assert_invariants();
    }

    #[test]
    fn test_oldest() {
        let (mut store, log) = recording_store(0, LONG_TTL);
        assert_eq!(store.get_oldest(), None);
        assert_eq!(store.remove_oldest(), None);

        store.add(key("a"), 1);
        store.add(key("b"), 2);

        assert_eq!(store.get_oldest(), Some((key("a"), 1)));
        assert_eq!(store.keys(), vec![key("a"), key("b")], "get_oldest must not reorder");

        assert_eq!(store.remove_oldest(), Some((key("a"), 1)));
        assert_eq!(store.get_oldest(), Some((key("b"), 2)));
        assert_eq!(*log.lock().unwrap(), vec![(key("a"), 1)]);
        store.assert_invariants();
    }

    #[test]
    fn test_remove() {
        let (mut store, log) = recording_store(0, LONG_TTL);
        store.add(key("a"), 1);

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(!store.remove("never"));

        assert!(store.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![(key("a"), 1)]);
        assert_eq!(store.stats().removals, 1);
    }

    #[test]
    fn test_purge() {
        let (mut store, log) = recording_store(0, LONG_TTL);
        store.add(key("a"), 1);
        store.add(key("b"), 2);

        assert_eq!(store.purge(), 2);
        assert!(store.is_empty());
        assert!(store.keys().is_empty());
        assert_eq!(*log.lock().unwrap(), vec![(key("a"), 1), (key("b"), 2)]);

        // Purging an empty store is a no-op
        assert_eq!(store.purge(), 0);
        assert_eq!(log.lock().unwrap().len(), 2);

        store.add(key("c"), 3);
        assert_eq!(store.get("c"), Some(3));
        store.assert_invariants();
    }

    #[test]
    fn test_resize() {
        let (mut store, log) = recording_store(0, LONG_TTL);
        for (i, k) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store.add(key(k), i as u32);
        }

        assert_eq!(store.resize(0), 0);
        assert_eq!(store.capacity(), 0);

        assert_eq!(store.resize(2), 3);
        assert_eq!(store.capacity(), 2);
        assert_eq!(store.keys(), vec![key("d"), key("e")]);
        assert_eq!(
            *log.lock().unwrap(),
            vec![(key("a"), 0), (key("b"), 1), (key("c"), 2)]
        );

        // Growing evicts nothing
        assert_eq!(store.resize(10), 0);
        assert_eq!(store.len(), 2);
        store.assert_invariants();
    }

    #[test]
    fn test_keys_oldest_first() {
        let mut store = LruStore::new(0, LONG_TTL, None);
        store.add(key("a"), 1);
        store.add(key("b"), 2);
        store.add(key("c"), 3);
        store.get("a");

        assert_eq!(store.keys(), vec![key("b"), key("c"), key("a")]);
    }

    #[test]
    fn test_debug_output() {
        let (store, _) = recording_store(3, LONG_TTL);
        let out = format!("{:?}", store);
        assert!(out.contains("capacity: 3"));
        assert!(out.contains("has_on_evicted: true"));
    }
}

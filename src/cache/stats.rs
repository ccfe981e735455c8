//! Cache Statistics Module
//!
//! Tracks cache counters: lookups, and the different ways entries leave.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of `get` calls that returned a live value
    pub hits: u64,
    /// Number of `get` calls for absent or expired keys
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Expired entries reaped by a sweep or `delete_expired`
    pub expirations: u64,
    /// Entries dropped by `remove`, `remove_oldest` or `purge`
    pub removals: u64,
    /// Current number of entries in the cache, expired ones included
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_removal(&mut self) {
        self.removals += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

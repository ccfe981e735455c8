//! Cache Entry Module
//!
//! Defines the record stored in each list node: key, value and expiry.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single cache entry with its absolute expiration time.
///
/// Entries are refreshed in place (value and expiry overwritten) so the list
/// node holding them never has to be reallocated.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The key this entry is indexed under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Expiration instant, None = never expires
    pub expires_at: Option<Instant>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` after `now`.
    ///
    /// `None`, or a TTL too large to represent, never expires. A zero TTL
    /// expires as soon as the clock moves past `now`.
    pub fn new(key: K, value: V, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            key,
            value,
            expires_at: deadline(now, ttl),
        }
    }

    // == Refresh ==
    /// Replaces the value and restarts the TTL from `now`.
    pub fn refresh(&mut self, value: V, ttl: Option<Duration>, now: Instant) {
        self.value = value;
        self.expires_at = deadline(now, ttl);
    }

    // == Is Expired ==
    /// Checks whether the entry has expired as of `now`.
    ///
    /// The deadline itself is still live: an entry is expired only once
    /// `now` is strictly past `expires_at`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Checks whether the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if the entry never expires.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}

fn deadline(now: Instant, ttl: Option<Duration>) -> Option<Instant> {
    ttl.and_then(|ttl| now.checked_add(ttl))
}

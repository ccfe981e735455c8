//! Expirable LRU - a thread-safe LRU cache with per-entry TTL
//!
//! Combines least-recently-used capacity eviction with time-based expiry,
//! and can run a background sweep that reclaims expired entries between
//! accesses.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, EvictCallback, ExpirableLru};
pub use config::{CacheConfig, DEFAULT_PURGE_INTERVAL};
pub use error::{CacheError, Result};

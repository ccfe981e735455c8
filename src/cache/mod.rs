//! Cache Module
//!
//! In-memory LRU caching with per-entry TTL expiration.

mod entry;
mod expirable;
mod list;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use expirable::ExpirableLru;
pub use list::{EntryList, Iter, NodeHandle};
pub use stats::CacheStats;
pub use store::{EvictCallback, LruStore};

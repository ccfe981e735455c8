//! Configuration Module
//!
//! Handles loading and normalizing cache configuration, either built in code
//! or read from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Sweep interval used when a sweep is required but none was given.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Environment variable holding the maximum number of entries.
pub const ENV_CAPACITY: &str = "LRU_CAPACITY";
/// Environment variable holding the default TTL in milliseconds.
pub const ENV_DEFAULT_TTL_MS: &str = "LRU_DEFAULT_TTL_MS";
/// Environment variable holding the sweep interval in milliseconds.
pub const ENV_PURGE_INTERVAL_MS: &str = "LRU_PURGE_INTERVAL_MS";

/// Cache configuration parameters.
///
/// A zero in any field means "not set": unlimited capacity, entries that
/// never expire by default, or an automatically chosen sweep interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheConfig {
    /// Maximum number of entries, 0 = unlimited
    pub capacity: usize,
    /// TTL applied by `add`, zero = never expire
    pub default_ttl: Duration,
    /// Background sweep period, zero = pick automatically
    pub purge_interval: Duration,
}

impl CacheConfig {
    /// Creates a config with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    ///
    /// # Environment Variables
    /// - `LRU_CAPACITY` - Maximum cache entries (default: 0, unlimited)
    /// - `LRU_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 0, never expire)
    /// - `LRU_PURGE_INTERVAL_MS` - Sweep frequency in milliseconds (default: 0, auto)
    pub fn from_env() -> Self {
        Self {
            capacity: env::var(ENV_CAPACITY)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            default_ttl: env::var(ENV_DEFAULT_TTL_MS)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::ZERO),
            purge_interval: env::var(ENV_PURGE_INTERVAL_MS)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(Duration::ZERO),
        }
    }

    /// Strict variant of [`CacheConfig::from_env`].
    ///
    /// Missing variables still default, but a variable that is set and does
    /// not parse yields [`CacheError::InvalidConfig`].
    pub fn try_from_env() -> Result<Self> {
        Ok(Self {
            capacity: parse_var(ENV_CAPACITY)?.unwrap_or(0),
            default_ttl: Duration::from_millis(parse_var(ENV_DEFAULT_TTL_MS)?.unwrap_or(0)),
            purge_interval: Duration::from_millis(parse_var(ENV_PURGE_INTERVAL_MS)?.unwrap_or(0)),
        })
    }

    /// Returns true when entries added with the default TTL can expire.
    pub fn ttl_is_bounded(&self) -> bool {
        !self.default_ttl.is_zero()
    }

    /// Returns the interval the background sweep should run at, or `None`
    /// when no sweep is needed.
    ///
    /// A sweep runs only with a bounded TTL, and only if the cache is
    /// bounded or an interval was asked for explicitly. A zero interval in
    /// that case is forced to [`DEFAULT_PURGE_INTERVAL`].
    pub fn sweep_interval(&self) -> Option<Duration> {
        if !self.ttl_is_bounded() {
            return None;
        }
        if self.capacity == 0 && self.purge_interval.is_zero() {
            return None;
        }
        if self.purge_interval.is_zero() {
            Some(DEFAULT_PURGE_INTERVAL)
        } else {
            Some(self.purge_interval)
        }
    }
}

fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::InvalidConfig { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 0);
        assert_eq!(config.default_ttl, Duration::ZERO);
        assert_eq!(config.purge_interval, Duration::ZERO);
        assert!(!config.ttl_is_bounded());
    }

    #[test]
    fn test_config_from_env() {
        // All env manipulation lives in this one test so parallel tests
        // don't observe each other's variables.
        env::remove_var(ENV_CAPACITY);
        env::remove_var(ENV_DEFAULT_TTL_MS);
        env::remove_var(ENV_PURGE_INTERVAL_MS);
        assert_eq!(CacheConfig::from_env(), CacheConfig::default());
        assert_eq!(CacheConfig::try_from_env().unwrap(), CacheConfig::default());

        env::set_var(ENV_CAPACITY, "128");
        env::set_var(ENV_DEFAULT_TTL_MS, "1500");
        env::set_var(ENV_PURGE_INTERVAL_MS, "250");
        let expected = CacheConfig::new()
            .with_capacity(128)
            .with_default_ttl(Duration::from_millis(1500))
            .with_purge_interval(Duration::from_millis(250));
        assert_eq!(CacheConfig::from_env(), expected);
        assert_eq!(CacheConfig::try_from_env().unwrap(), expected);

        env::set_var(ENV_CAPACITY, "many");
        assert_eq!(CacheConfig::from_env().capacity, 0);
        let err = CacheConfig::try_from_env().unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig { var: ENV_CAPACITY, .. }));

        env::remove_var(ENV_CAPACITY);
        env::remove_var(ENV_DEFAULT_TTL_MS);
        env::remove_var(ENV_PURGE_INTERVAL_MS);
    }

    #[test]
    fn test_no_sweep_without_ttl() {
        let config = CacheConfig::new()
            .with_capacity(10)
            .with_purge_interval(Duration::from_millis(20));
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn test_no_sweep_unbounded_without_interval() {
        let config = CacheConfig::new().with_default_ttl(Duration::from_secs(1));
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn test_bounded_cache_forces_default_interval() {
        let config = CacheConfig::new()
            .with_capacity(10)
            .with_default_ttl(Duration::from_secs(1));
        assert_eq!(config.sweep_interval(), Some(DEFAULT_PURGE_INTERVAL));
    }

    #[test]
    fn test_explicit_interval_enables_sweep() {
        let config = CacheConfig::new()
            .with_default_ttl(Duration::from_millis(10))
            .with_purge_interval(Duration::from_millis(20));
        assert_eq!(config.sweep_interval(), Some(Duration::from_millis(20)));
    }
}

//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Cache operations
//! themselves never fail; these errors cover configuration loading and
//! starting the background sweep.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache crate.
#[derive(Error, Debug)]
pub enum CacheError {
    /// An environment variable was present but could not be parsed
    #[error("Invalid configuration: {var}={value:?}")]
    InvalidConfig { var: &'static str, value: String },

    /// The dedicated sweep thread could not be spawned
    #[error("Failed to spawn sweep thread: {0}")]
    SweepSpawn(#[source] std::io::Error),

    /// The fallback runtime driving the sweep could not be built
    #[error("Failed to build sweep runtime: {0}")]
    SweepRuntime(#[source] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache crate.
pub type Result<T> = std::result::Result<T, CacheError>;

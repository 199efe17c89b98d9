//! # relic-cache
//!
//! A two-tier keyed cache: a bounded in-process tier with per-entry TTL
//! and tags, optionally fronted onto an external store behind the
//! [`CacheBackend`] contract. Invalidation works by key, by tag
//! intersection, or by regex pattern, with a background sweep interval
//! for expiry and queued invalidations.
//!
//! The cache knows nothing about SQL or entities; it is a generic keyed
//! store consumed opportunistically by higher layers.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod manager;
pub mod memory;

pub use config::CacheConfig;
pub use manager::{CacheManager, CacheStats, Invalidation};
pub use memory::MemoryCache;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Byte-level contract for an external (second-tier) store. The external
/// tier is consulted only on first-tier misses; hits are back-filled.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove one key; returns whether it existed
    async fn del(&self, key: &str) -> CacheResult<bool>;

    async fn clear(&self) -> CacheResult<()>;
}

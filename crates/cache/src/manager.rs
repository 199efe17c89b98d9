//! Two-tier cache manager
//!
//! Read path: first tier, then the external tier on a miss, back-filling
//! hits. Write path: both tiers. Invalidation by key, tag intersection,
//! or regex pattern, applied immediately or queued for the background
//! sweep.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::memory::MemoryCache;
use crate::{CacheBackend, CacheError, CacheResult};

/// A deferred invalidation, drained by the sweeper
#[derive(Debug, Clone)]
pub enum Invalidation {
    Key(String),
    Tags(Vec<String>),
    Pattern(String),
}

/// Hit/miss counters and current first-tier size
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Two-tier cache front door with typed accessors
pub struct CacheManager {
    l1: MemoryCache,
    l2: Option<Arc<dyn CacheBackend>>,
    config: CacheConfig,
    pending: Mutex<VecDeque<Invalidation>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            l1: MemoryCache::new(config.max_entries),
            l2: None,
            config,
            pending: Mutex::new(VecDeque::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Attach an external second tier
    pub fn with_external(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            l1: MemoryCache::new(config.max_entries),
            l2: Some(backend),
            config,
            pending: Mutex::new(VecDeque::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Typed read. External-tier hits are back-filled into the first tier
    /// under the default TTL.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        if let Some(bytes) = self.l1.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        if let Some(l2) = &self.l2 {
            if let Some(bytes) = l2.get(key).await? {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.l1
                    .insert(key, bytes.clone(), self.config.default_ttl, &[]);
                return Ok(Some(serde_json::from_slice(&bytes)?));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Typed write-through to both tiers
    pub async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> CacheResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let ttl = ttl.or(self.config.default_ttl);
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.l1.insert(key, bytes.clone(), ttl, &tags);
        if let Some(l2) = &self.l2 {
            l2.set(key, bytes, ttl).await?;
        }
        Ok(())
    }

    /// Remove one key from both tiers
    pub async fn del(&self, key: &str) -> CacheResult<bool> {
        let removed = self.l1.remove(key);
        let mut removed_l2 = false;
        if let Some(l2) = &self.l2 {
            removed_l2 = l2.del(key).await?;
        }
        Ok(removed || removed_l2)
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.l1.clear_all();
        if let Some(l2) = &self.l2 {
            l2.clear().await?;
        }
        Ok(())
    }

    /// Drop every entry whose tag list intersects `tags`; returns how many
    /// first-tier entries went away
    pub async fn invalidate_by_tags(&self, tags: &[&str]) -> CacheResult<usize> {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let keys = self.l1.keys_with_any_tag(&tags);
        self.remove_keys(&keys).await?;
        debug!(removed = keys.len(), "tag invalidation");
        Ok(keys.len())
    }

    /// Drop every entry whose key matches the regex pattern. The external
    /// tier cannot be enumerated, so only keys known to the first tier are
    /// removed from it.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> CacheResult<usize> {
        let regex = Regex::new(pattern)
            .map_err(|e| CacheError::Configuration(format!("invalid pattern: {}", e)))?;
        let keys = self.l1.keys_matching(&regex);
        self.remove_keys(&keys).await?;
        debug!(pattern, removed = keys.len(), "pattern invalidation");
        Ok(keys.len())
    }

    /// Defer an invalidation to the next sweep
    pub fn queue_invalidation(&self, invalidation: Invalidation) {
        self.pending.lock().push_back(invalidation);
    }

    /// Apply everything queued; returns the number of drained requests
    pub async fn drain_pending(&self) -> CacheResult<usize> {
        let drained: Vec<Invalidation> = {
            let mut pending = self.pending.lock();
            pending.drain(..).collect()
        };
        for invalidation in &drained {
            match invalidation {
                Invalidation::Key(key) => {
                    self.del(key).await?;
                }
                Invalidation::Tags(tags) => {
                    let tags: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
                    self.invalidate_by_tags(&tags).await?;
                }
                Invalidation::Pattern(pattern) => {
                    self.invalidate_by_pattern(pattern).await?;
                }
            }
        }
        Ok(drained.len())
    }

    /// Start the background sweep: expire first-tier entries and drain the
    /// invalidation queue every `sweep_interval`. Abort the handle to stop.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = manager.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let expired = manager.l1.remove_expired();
                match manager.drain_pending().await {
                    Ok(drained) => {
                        if expired > 0 || drained > 0 {
                            debug!(expired, drained, "cache sweep");
                        }
                    }
                    Err(err) => warn!(%err, "cache sweep failed"),
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.l1.len(),
        }
    }

    async fn remove_keys(&self, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            self.l1.remove(key);
            if let Some(l2) = &self.l2 {
                l2.del(key).await?;
            }
        }
        Ok(())
    }
}

//! In-process cache tier
//!
//! Bounded map with per-entry TTL and tags. Eviction at capacity removes
//! the oldest-inserted entry; access order does not matter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;

use crate::{CacheBackend, CacheResult};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    /// Insertion tiebreaker for same-instant inserts
    sequence: u64,
    inserted_at: Instant,
    expires_at: Option<Instant>,
    tags: Vec<String>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// Bounded in-process store, usable standalone or as the first tier of
/// [`crate::CacheManager`]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    max_entries: usize,
    sequence: AtomicU64,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn insert(&self, key: &str, data: Vec<u8>, ttl: Option<Duration>, tags: &[String]) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            Entry {
                data,
                sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                inserted_at: now,
                expires_at: ttl.map(|ttl| now + ttl),
                tags: tags.to_vec(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.is_expired() {
                    true
                } else {
                    return Some(entry.data.clone());
                }
            }
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries; returns how many went away
    pub fn remove_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
        }
        expired.len()
    }

    /// Keys whose tag list intersects the given tags
    pub fn keys_with_any_tag(&self, tags: &[String]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.value().tags.iter().any(|t| tags.contains(t)))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Keys matching the compiled pattern
    pub fn keys_matching(&self, pattern: &Regex) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| pattern.is_match(e.key()))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Strict oldest-insertion-first eviction: the entry that has lived
    /// longest goes, regardless of how recently it was read.
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| (e.value().inserted_at, e.value().sequence))
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

/// The in-process store satisfies the backend contract too, which makes
/// it usable as an external-tier stand-in.
#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(MemoryCache::get(self, key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.insert(key, value, ttl, &[]);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        Ok(self.remove(key))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.clear_all();
        Ok(())
    }
}

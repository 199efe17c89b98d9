//! Cache configuration

use std::time::Duration;

/// Tuning knobs for the in-process tier and the background sweeper
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry cap for the in-process tier; the oldest-inserted entry is
    /// evicted at capacity
    pub max_entries: usize,
    /// TTL applied when a put does not specify one
    pub default_ttl: Option<Duration>,
    /// How often the background task sweeps expired entries and drains
    /// queued invalidations
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            default_ttl: Some(Duration::from_secs(300)),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

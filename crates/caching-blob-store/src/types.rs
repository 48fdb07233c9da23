//! Cache sizing configuration

use std::time::Duration;

/// Size and free-space targets for the cache tier.
#[derive(Debug, Clone)]
pub struct CacheLimits {
    /// Cap on total cached bytes; exceeding it triggers eviction down to
    /// the cap.
    pub max_cache_size: u64,
    /// When device free space is at or below this, evict until
    /// `target_device_free` is available.
    pub min_device_free: u64,
    /// Free-space goal for a free-space-driven eviction pass.
    pub target_device_free: u64,
    /// Period of the background prune timer; `None` disables it (prunes
    /// still run after each cache-filling download).
    pub prune_interval: Option<Duration>,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_cache_size: 1024 * 1024 * 1024,     // 1GB
            min_device_free: 256 * 1024 * 1024,     // 256MB
            target_device_free: 512 * 1024 * 1024,  // 512MB
            prune_interval: Some(Duration::from_secs(10 * 60)),
        }
    }
}

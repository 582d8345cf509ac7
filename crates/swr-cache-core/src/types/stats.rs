//! Cache statistics

/// Diagnostics snapshot returned by `stats()`
///
/// Key counts come from a full SCAN and are approximate; the counters are
/// local to this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cache enabled by configuration
    pub enabled: bool,
    /// Store reachable at the time of the snapshot
    pub ready: bool,
    /// Data keys under the prefix
    pub keys: usize,
    /// Metadata keys under the prefix
    pub meta_keys: usize,
    /// Refresh locks currently held
    pub locks: usize,
    /// Fresh hits
    pub hits: u64,
    /// Served stale while revalidating
    pub stale_hits: u64,
    /// Misses (including expired records)
    pub misses: u64,
    /// Background refreshes started
    pub refreshes_started: u64,
    /// Recomputes (foreground or background) that persisted a value
    pub refreshes_succeeded: u64,
    /// Recomputes that failed
    pub refreshes_failed: u64,
    /// Foreground recomputes that exceeded their budget or failed
    pub timeouts: u64,
    /// Lock acquisitions lost to another refresher
    pub lock_contention: u64,
    /// Store calls that failed and were absorbed
    pub store_errors: u64,
}

impl CacheStats {
    /// Ratio of fresh and stale hits to all lookups (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.stale_hits) as f64 / total as f64
        }
    }

    pub fn total_lookups(&self) -> u64 {
        self.hits + self.stale_hits + self.misses
    }
}

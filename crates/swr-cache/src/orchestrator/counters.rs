use std::sync::atomic::{AtomicU64, Ordering};

use swr_cache_core::CacheStats;

/// Process-local lookup and refresh counters
#[derive(Debug, Default)]
pub(super) struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refreshes_started: AtomicU64,
    refreshes_succeeded: AtomicU64,
    refreshes_failed: AtomicU64,
    timeouts: AtomicU64,
    lock_contention: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    pub(super) fn hit(&self) {
        bump(&self.hits);
    }

    pub(super) fn stale_hit(&self) {
        bump(&self.stale_hits);
    }

    pub(super) fn miss(&self) {
        bump(&self.misses);
    }

    pub(super) fn refresh_started(&self) {
        bump(&self.refreshes_started);
    }

    pub(super) fn refresh_succeeded(&self) {
        bump(&self.refreshes_succeeded);
    }

    pub(super) fn refresh_failed(&self) {
        bump(&self.refreshes_failed);
    }

    pub(super) fn timeout(&self) {
        bump(&self.timeouts);
    }

    pub(super) fn lock_contended(&self) {
        bump(&self.lock_contention);
    }

    /// Counter fields of a [`CacheStats`]; store fields are left default
    pub(super) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
            refreshes_succeeded: self.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            lock_contention: self.lock_contention.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}

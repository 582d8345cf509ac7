//! In-process layer in front of the shared store
//!
//! Memoises raw `(value, meta)` byte pairs for a short TTL so hot keys skip
//! the network round trip. Freshness is still derived from the stored meta,
//! and the distributed lock still guards recomputes: this layer only saves
//! reads, it cannot stop other processes from stampeding.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use swr_cache_storage::glob_match;

/// Default entry bound for [`LocalLayer`]
pub const DEFAULT_LOCAL_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct LocalEntry {
    value: Vec<u8>,
    meta: Option<Vec<u8>>,
    expires_at: Instant,
}

/// Short-lived per-process copy of store records, keyed by relative key
///
/// Bounded: expired entries are swept at most once per `ttl` on write, and
/// a full layer evicts arbitrary entries to make room.
#[derive(Debug, Clone)]
pub struct LocalLayer {
    entries: Arc<DashMap<String, LocalEntry>>,
    ttl: Duration,
    capacity: usize,
    next_sweep: Arc<Mutex<Instant>>,
}

impl LocalLayer {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_LOCAL_CAPACITY)
    }

    /// `capacity` of 0 means unbounded (expired entries are still swept)
    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::with_capacity(capacity.min(DEFAULT_LOCAL_CAPACITY))),
            ttl,
            capacity,
            next_sweep: Arc::new(Mutex::new(Instant::now() + ttl)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw value and meta bytes, if memoised and not expired
    pub fn get(&self, key: &str) -> Option<(Vec<u8>, Option<Vec<u8>>)> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                return Some((entry.value.clone(), entry.meta.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        None
    }

    pub fn put(&self, key: &str, value: Vec<u8>, meta: Option<Vec<u8>>) {
        let now = Instant::now();
        self.maybe_sweep(now);
        if !self.entries.contains_key(key) {
            self.maybe_evict(now);
        }

        self.entries.insert(
            key.to_string(),
            LocalEntry {
                value,
                meta,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop every expired entry; returns how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Evict every key matching a glob pattern
    pub fn remove_matching(&self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !glob_match(pattern, key));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_sweep(&self, now: Instant) {
        {
            let mut next = self.next_sweep.lock();
            if now < *next {
                return;
            }
            *next = now + self.ttl;
        }
        self.entries.retain(|_, e| e.expires_at > now);
    }

    fn maybe_evict(&self, now: Instant) {
        if self.capacity == 0 || self.entries.len() < self.capacity {
            return;
        }

        // Expired entries go first
        self.entries.retain(|_, e| e.expires_at > now);
        if self.entries.len() < self.capacity {
            return;
        }

        let excess = self.entries.len() + 1 - self.capacity;
        let victims: Vec<String> = self
            .entries
            .iter()
            .take(excess)
            .map(|entry| entry.key().clone())
            .collect();
        for key in victims {
            self.entries.remove(&key);
        }
    }
}

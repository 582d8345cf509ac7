//! In-memory store using DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use swr_cache_core::{CacheError, CacheStore, Result};

use crate::glob::glob_match;

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(bytes: Vec<u8>, ttl: Duration) -> Self {
        Self {
            bytes,
            // Zero TTL stores without expiry, like SET without PX
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process [`CacheStore`] with Redis-like expiry semantics
///
/// Expired keys are dropped lazily on access and by [`purge_expired`](Self::purge_expired).
/// Cloning creates a new handle to the SAME underlying map, so one instance
/// can back several orchestrators to simulate a shared remote store.
///
/// Expiry follows `tokio::time`, so tests running with a paused clock can
/// advance past TTLs deterministically.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<DashMap<String, StoredValue>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.data.len())
            .field("available", &self.is_available())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`CacheError::Connection`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| !e.value().is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live for a key, `None` if absent or persistent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.data.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|deadline| deadline - now)
    }

    /// Drop every expired key, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, v| !v.is_expired(now));
        before.saturating_sub(self.data.len())
    }

    fn check(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CacheError::Connection("memory store offline".to_string()))
        }
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let expired = match self.data.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.bytes.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.data.remove_if(key, |_, v| v.is_expired(now));
        }
        None
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.read(key))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check()?;
        Ok(keys.iter().map(|k| self.read(k)).collect())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check()?;
        self.data
            .insert(key.to_string(), StoredValue::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &[u8])], ttl: Duration) -> Result<()> {
        self.check()?;
        for (key, value) in entries {
            self.data
                .insert(key.to_string(), StoredValue::new(value.to_vec(), ttl));
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool> {
        self.check()?;
        let now = Instant::now();
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::new(value.to_vec(), ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value.to_vec(), ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        self.check()?;
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| self.data.remove(*k))
            .filter(|(_, v)| !v.is_expired(now))
            .count();
        Ok(removed as u64)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .data
            .iter()
            .filter(|e| !e.value().is_expired(now) && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

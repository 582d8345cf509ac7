//! Distributed refresh lock
//!
//! One marker key per cache key, created with SETNX and a TTL. The TTL is
//! the only thing that frees a lock whose holder crashed, so it must exceed
//! the worst-case generator latency; otherwise a second refresher may start
//! while the first is still running.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use swr_cache_core::{CacheStore, KeySpace, LOG_TARGET};
use swr_cache_storage::StoreAdapter;

/// Acquires and releases `{prefix}:lock:{key}` markers
///
/// Fail-open: when the store cannot answer, `acquire` reports success.
pub struct LockManager<S> {
    store: StoreAdapter<S>,
    keys: KeySpace,
    ttl: Duration,
    marker: Arc<str>,
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            keys: self.keys.clone(),
            ttl: self.ttl,
            marker: Arc::clone(&self.marker),
        }
    }
}

impl<S: CacheStore> LockManager<S> {
    pub fn new(store: StoreAdapter<S>, keys: KeySpace, ttl: Duration) -> Self {
        Self {
            store,
            keys,
            ttl,
            marker: holder_marker().into(),
        }
    }

    /// Default lock lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value written into lock keys: `{host}:{pid}:{random}`
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Try to take the lock for `key` with the default TTL
    pub async fn acquire(&self, key: &str) -> bool {
        self.acquire_with_ttl(key, self.ttl).await
    }

    pub async fn acquire_with_ttl(&self, key: &str, ttl: Duration) -> bool {
        let lock_key = self.keys.lock_key(key);
        let acquired = self
            .store
            .acquire(&lock_key, self.marker.as_bytes(), ttl)
            .await;
        debug!(target: LOG_TARGET, key = %key, acquired, "Refresh lock");
        acquired
    }

    /// Delete the lock for `key`; returns whether one existed
    pub async fn release(&self, key: &str) -> bool {
        let lock_key = self.keys.lock_key(key);
        self.store.delete(&[lock_key.as_str()]).await > 0
    }
}

fn holder_marker() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "local".to_string());
    format!("{}:{}:{:08x}", host, std::process::id(), rand::random::<u32>())
}

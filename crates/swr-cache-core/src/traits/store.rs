//! Raw key-value store contract

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

/// Primitives the orchestrator needs from a networked key-value store
///
/// Keys are passed fully qualified; namespacing is the caller's job.
/// Every method may fail with [`CacheError::Connection`](crate::CacheError::Connection)
/// or [`CacheError::Backend`](crate::CacheError::Backend); the fail-open
/// adapter in `swr-cache-storage` turns those into "absent" / "no-op".
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Read several values in one round trip, in key order
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Write a value that expires after `ttl`, overwriting any previous value
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Write several values with the same `ttl` in one round trip
    async fn set_many(&self, entries: &[(&str, &[u8])], ttl: Duration) -> Result<()>;

    /// Create `key` only if it does not exist
    ///
    /// Returns `true` when this call created it.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[&str]) -> Result<u64>;

    /// All keys matching a Redis-style glob pattern
    ///
    /// Implementations iterate incrementally (SCAN), so keys written or
    /// removed concurrently may or may not show up.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;
}

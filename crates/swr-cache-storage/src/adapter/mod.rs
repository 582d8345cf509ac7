//! Fail-open wrapper around a [`CacheStore`]
//!
//! Every call returns a plain value: reads come back absent, writes report
//! `false`, lock acquisition reports `true`. Failures are logged, counted
//! and move the adapter to [`StoreState::Degraded`], where a background task
//! pings the store with exponential backoff. After `ping_attempts` failed
//! pings the adapter stays [`StoreState::Down`] until
//! [`reconnect`](StoreAdapter::reconnect) is called.

mod config;
mod state;

pub use config::AdapterConfig;
pub use state::StoreState;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use swr_cache_core::{CacheError, CacheStore, LOG_TARGET, Result};

use state::Readiness;

struct Inner<S> {
    store: S,
    config: AdapterConfig,
    readiness: Readiness,
    probing: AtomicBool,
    errors: AtomicU64,
}

/// Readiness-tracking, error-absorbing handle to a store
///
/// Cloning creates a new handle to the SAME store and readiness state.
pub struct StoreAdapter<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for StoreAdapter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for StoreAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("state", &self.inner.readiness.get())
            .field("errors", &self.inner.errors.load(Ordering::Relaxed))
            .finish()
    }
}

impl<S: CacheStore> StoreAdapter<S> {
    /// Wrap a store; no I/O happens until the first call
    pub fn new(store: S, config: AdapterConfig) -> Self {
        if !config.enabled {
            info!(target: LOG_TARGET, "Cache disabled by configuration");
        }
        Self {
            inner: Arc::new(Inner {
                readiness: Readiness::new(config.enabled),
                store,
                config,
                probing: AtomicBool::new(false),
                errors: AtomicU64::new(0),
            }),
        }
    }

    /// The wrapped store
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    pub fn state(&self) -> StoreState {
        self.inner.readiness.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    /// Whether the last call or ping succeeded
    pub fn is_ready(&self) -> bool {
        self.state() == StoreState::Ready
    }

    /// Store failures absorbed so far
    pub fn error_count(&self) -> u64 {
        self.inner.errors.load(Ordering::Relaxed)
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.accepts_calls() {
            return None;
        }
        self.call("get", self.inner.store.get(key)).await.flatten()
    }

    /// Values in key order; all absent when the store is unavailable
    pub async fn get_many(&self, keys: &[&str]) -> Vec<Option<Vec<u8>>> {
        if !self.accepts_calls() {
            return vec![None; keys.len()];
        }
        match self.call("get_many", self.inner.store.get_many(keys)).await {
            Some(values) if values.len() == keys.len() => values,
            _ => vec![None; keys.len()],
        }
    }

    /// Returns whether the write reached the store
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> bool {
        if !self.accepts_calls() {
            return false;
        }
        self.call("set", self.inner.store.set(key, value, ttl))
            .await
            .is_some()
    }

    pub async fn set_many(&self, entries: &[(&str, &[u8])], ttl: Duration) -> bool {
        if !self.accepts_calls() {
            return false;
        }
        self.call("set_many", self.inner.store.set_many(entries, ttl))
            .await
            .is_some()
    }

    /// Create `key` only if absent
    ///
    /// Reports `true` whenever the store cannot answer, so an outage never
    /// blocks a caller from computing a value itself.
    pub async fn acquire(&self, key: &str, value: &[u8], ttl: Duration) -> bool {
        if !self.accepts_calls() {
            return true;
        }
        self.call("set_nx", self.inner.store.set_nx(key, value, ttl))
            .await
            .unwrap_or(true)
    }

    /// Returns how many keys existed; 0 when the store is unavailable
    pub async fn delete(&self, keys: &[&str]) -> u64 {
        if keys.is_empty() || !self.accepts_calls() {
            return 0;
        }
        self.call("delete", self.inner.store.delete(keys))
            .await
            .unwrap_or(0)
    }

    pub async fn scan(&self, pattern: &str) -> Vec<String> {
        if !self.accepts_calls() {
            return Vec::new();
        }
        self.call("scan", self.inner.store.scan(pattern))
            .await
            .unwrap_or_default()
    }

    /// Foreground check for startup: ping with the configured backoff until
    /// the store answers or attempts run out (then [`StoreState::Down`])
    pub async fn connect(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let attempts = self.inner.config.ping_attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.inner.config.backoff(attempt - 1)).await;
            }
            match self.inner.store.ping().await {
                Ok(()) => {
                    self.on_success();
                    return true;
                }
                Err(e) => {
                    self.inner.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: LOG_TARGET,
                        attempt = attempt + 1,
                        attempts,
                        error = %e,
                        "Store connect attempt failed"
                    );
                }
            }
        }

        self.inner.readiness.mark_down();
        warn!(target: LOG_TARGET, attempts, "Store unreachable; running without cache");
        false
    }

    /// Ping the store once, regardless of current state
    pub async fn ping(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.call("ping", self.inner.store.ping()).await.is_some()
    }

    /// Explicit reconnect attempt, the only way out of [`StoreState::Down`]
    pub async fn reconnect(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        info!(target: LOG_TARGET, state = %self.state(), "Reconnecting to store");
        self.ping().await
    }

    fn accepts_calls(&self) -> bool {
        self.state().accepts_calls()
    }

    async fn call<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Option<T> {
        match fut.await {
            Ok(value) => {
                self.on_success();
                Some(value)
            }
            Err(e) => {
                self.on_failure(op, &e);
                None
            }
        }
    }

    fn on_success(&self) {
        if let Some(previous) = self.inner.readiness.report_success() {
            info!(target: LOG_TARGET, previous = %previous, "Store ready");
        }
    }

    fn on_failure(&self, op: &'static str, error: &CacheError) {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            target: LOG_TARGET,
            op,
            error = %error,
            state = %self.state(),
            "Store call failed"
        );

        if error.is_unavailable() && self.inner.readiness.report_failure() {
            self.spawn_pinger();
        }
    }

    fn spawn_pinger(&self) {
        if self.inner.probing.swap(true, Ordering::SeqCst) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner.probing.store(false, Ordering::SeqCst);
            self.inner.readiness.mark_down();
            return;
        };

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            ping_until_ready(&inner).await;
            inner.probing.store(false, Ordering::SeqCst);
        });
    }
}

/// Ping with bounded exponential backoff until the store answers
async fn ping_until_ready<S: CacheStore>(inner: &Inner<S>) -> bool {
    let attempts = inner.config.ping_attempts.max(1);

    for attempt in 0..attempts {
        tokio::time::sleep(inner.config.backoff(attempt)).await;

        // Recovered through another path (explicit reconnect)
        if inner.readiness.get() != StoreState::Degraded {
            return true;
        }

        match inner.store.ping().await {
            Ok(()) => {
                if let Some(previous) = inner.readiness.report_success() {
                    info!(
                        target: LOG_TARGET,
                        previous = %previous,
                        attempt = attempt + 1,
                        "Store ready"
                    );
                }
                return true;
            }
            Err(e) => {
                inner.errors.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: LOG_TARGET,
                    attempt = attempt + 1,
                    attempts,
                    error = %e,
                    "Store ping failed"
                );
            }
        }
    }

    if inner.readiness.mark_down() {
        warn!(
            target: LOG_TARGET,
            attempts,
            "Store unreachable; giving up until reconnect"
        );
    }
    false
}

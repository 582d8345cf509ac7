//! Stale-while-revalidate orchestration over a shared store

mod counters;
mod refresh;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

use swr_cache_core::{
    CacheKey, CacheMeta, CacheMetrics, CacheOperation, CacheStats, CacheStatus, CacheStore, Codec,
    Compressor, Freshness, JsonSerializer, KeyKind, KeySpace, LOG_TARGET, NoopCompressor,
    NoopMetrics, RefreshOutcome, Serializer, SwrOptions, SwrResponse, is_semantically_empty,
};
use swr_cache_storage::{StoreAdapter, StoreState};

use crate::config::{CacheConfig, LateResultPolicy};
use crate::local::LocalLayer;
use crate::lock::LockManager;

use counters::Counters;

/// Stored bytes of one record; meta is absent for plain `set` writes
struct Record {
    value: Vec<u8>,
    meta: Option<CacheMeta>,
    raw_meta: Option<Vec<u8>>,
    /// Read from the store rather than the local layer
    from_store: bool,
}

/// Where a lookup may read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Local layer first, then the store
    Any,
    /// The store only, for re-reads that must see other processes' writes
    Store,
}

/// A record resolved against the clock
enum Lookup<T> {
    Fresh { value: T, age: Option<Duration> },
    Stale { value: T, age: Duration },
    Miss,
}

/// How a foreground recompute ended
enum Computed<T> {
    Value(T),
    Failed(String),
    TimedOut,
}

/// Cache front door: pass-through reads and writes, cache-aside and the
/// stale-while-revalidate protocol
///
/// Generic over:
/// - `S`: the raw store (Memory, Redis)
/// - `Z`: the serializer (JSON, MessagePack, Bincode)
/// - `C`: the compressor
/// - `M`: the metrics collector
///
/// Nothing here returns an error caused by the store: outages degrade to
/// "always recompute". Cloning is cheap and shares all state.
pub struct CacheOrchestrator<S, Z = JsonSerializer, C = NoopCompressor, M = NoopMetrics>
where
    S: CacheStore,
    Z: Serializer,
    C: Compressor,
    M: CacheMetrics,
{
    store: StoreAdapter<S>,
    codec: Arc<Codec<Z, C>>,
    metrics: Arc<M>,
    keys: KeySpace,
    locks: LockManager<S>,
    local: Option<LocalLayer>,
    config: Arc<CacheConfig>,
    counters: Arc<Counters>,
}

// Constructors for default codec/metrics
impl<S: CacheStore> CacheOrchestrator<S, JsonSerializer, NoopCompressor, NoopMetrics> {
    /// Create an orchestrator with JSON payloads and no metrics
    pub fn new(store: S) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Create with custom config
    pub fn with_config(store: S, config: CacheConfig) -> Self {
        Self::with_codec_and_metrics(store, Codec::new(), NoopMetrics, config)
    }
}

// Full generic implementation
impl<S, Z, C, M> CacheOrchestrator<S, Z, C, M>
where
    S: CacheStore,
    Z: Serializer,
    C: Compressor,
    M: CacheMetrics,
{
    /// Create an orchestrator with a custom codec and metrics
    pub fn with_codec_and_metrics(store: S, codec: Codec<Z, C>, metrics: M, config: CacheConfig) -> Self {
        let store = StoreAdapter::new(store, config.adapter.clone());
        let keys = KeySpace::new(config.prefix.clone());
        let locks = LockManager::new(store.clone(), keys.clone(), config.lock_ttl);
        let local = config
            .local_ttl
            .map(|ttl| LocalLayer::with_capacity(ttl, config.local_capacity));

        Self {
            store,
            codec: Arc::new(codec),
            metrics: Arc::new(metrics),
            keys,
            locks,
            local,
            config: Arc::new(config),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    /// Distributed lock manager, for callers coordinating their own work
    pub fn lock_manager(&self) -> &LockManager<S> {
        &self.locks
    }

    /// The fail-open store handle
    pub fn store(&self) -> &StoreAdapter<S> {
        &self.store
    }

    /// Read a value directly, without freshness logic
    ///
    /// Absent, undecodable and unavailable all read as `None`.
    pub async fn get<T>(&self, key: impl CacheKey) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let key = key.cache_key();
        if self.rejects(&key) {
            return None;
        }
        let start = Instant::now();

        let value = match self.store.get(&self.keys.data_key(&key)).await {
            Some(bytes) => self.decode::<T>(&key, &bytes),
            None => None,
        };

        if value.is_some() {
            self.counters.hit();
            self.metrics.record_hit(&key);
        } else {
            self.counters.miss();
            self.metrics.record_miss(&key);
        }
        self.metrics.record_latency(CacheOperation::Get, start.elapsed());
        value
    }

    /// Write a value directly with a single TTL, overwriting unconditionally
    ///
    /// No metadata is written, so SWR lookups treat the value as fresh until
    /// the store expires it. Returns whether the store accepted the write.
    pub async fn set<T>(&self, key: impl CacheKey, value: &T, ttl: Duration) -> bool
    where
        T: Serialize,
    {
        let key = key.cache_key();
        if self.rejects(&key) {
            return false;
        }
        let start = Instant::now();

        let payload = match self.codec.encode_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: LOG_TARGET, key = %key, error = %e, "Failed to encode value");
                return false;
            }
        };

        let data_key = self.keys.data_key(&key);
        let meta_key = self.keys.meta_key(&key);
        let written = self.store.set(&data_key, &payload, ttl).await;
        // An older SWR meta would otherwise age this value out early
        self.store.delete(&[meta_key.as_str()]).await;
        if let Some(local) = &self.local {
            local.remove(&key);
        }

        self.metrics.record_latency(CacheOperation::Set, start.elapsed());
        written
    }

    /// Cache-aside without stampede protection
    ///
    /// Returns the cached value when present; otherwise awaits `generator`,
    /// stores its value for `ttl` and returns it. Only the generator's own
    /// error is ever returned, and nothing is stored in that case.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: impl CacheKey, ttl: Duration, generator: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.cache_key();
        let start = Instant::now();

        let result = if self.rejects(&key) {
            generator().await
        } else if let Some(value) = self.get::<T>(key.as_str()).await {
            Ok(value)
        } else {
            match generator().await {
                Ok(value) => {
                    self.persist(&key, &value, SwrOptions::new(ttl, ttl, Duration::ZERO))
                        .await;
                    Ok(value)
                }
                Err(e) => Err(e),
            }
        };

        self.metrics
            .record_latency(CacheOperation::GetOrSet, start.elapsed());
        result
    }

    /// Serve from cache, refreshing stale values in the background and
    /// recomputing misses under a distributed lock
    ///
    /// - fresh (`age <= ttl`): `Ready`, or `Empty` for an empty value
    /// - stale (`ttl < age <= stale_ttl`): `Stale` with the old value; the
    ///   first caller to take the lock refreshes it in the background
    /// - miss: the lock holder runs `generator` within `timeout` and returns
    ///   `Ready`/`Empty`, or `Timeout` with whatever the store still holds;
    ///   everyone else waits `lock_wait`, re-reads once and returns the
    ///   record or `Refreshing`
    ///
    /// Generator errors are logged, never returned.
    pub async fn get_or_stale_then_refresh<T, E, F, Fut>(
        &self,
        key: impl CacheKey,
        options: impl Into<SwrOptions>,
        generator: F,
    ) -> SwrResponse<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = key.cache_key();
        let options = options.into().normalized();
        if self.rejects(&key) {
            return self.uncached(options, generator).await;
        }
        let start = Instant::now();

        let response = match self.lookup::<T>(&key, Source::Any).await {
            Lookup::Fresh { value, age } => {
                self.counters.hit();
                self.metrics.record_hit(&key);
                let status = ready_status(&value);
                SwrResponse::cached(value, status, age)
            }
            Lookup::Stale { value, age } => {
                self.counters.stale_hit();
                self.metrics.record_stale_hit(&key);
                if self.locks.acquire(&key).await {
                    self.spawn_refresh(key.clone(), options, generator);
                } else {
                    self.contended(&key);
                }
                SwrResponse::cached(value, CacheStatus::Stale, Some(age))
            }
            Lookup::Miss => {
                self.counters.miss();
                self.metrics.record_miss(&key);
                self.fill(&key, options, generator).await
            }
        };

        debug!(
            target: LOG_TARGET,
            key = %key,
            status = %response.status,
            from_cache = response.from_cache,
            "SWR lookup"
        );
        self.metrics
            .record_latency(CacheOperation::StaleWhileRevalidate, start.elapsed());
        response
    }

    /// Delete one key's value and metadata; returns whether anything existed
    pub async fn del(&self, key: impl CacheKey) -> bool {
        let key = key.cache_key();
        if self.rejects(&key) {
            return false;
        }
        let start = Instant::now();

        let data_key = self.keys.data_key(&key);
        let meta_key = self.keys.meta_key(&key);
        let deleted = self
            .store
            .delete(&[data_key.as_str(), meta_key.as_str()])
            .await;
        if let Some(local) = &self.local {
            local.remove(&key);
        }

        self.metrics
            .record_latency(CacheOperation::Delete, start.elapsed());
        deleted > 0
    }

    /// Delete every value and metadata key whose relative key matches a glob
    ///
    /// Locks are left alone. Best-effort: keys written while the SCAN runs
    /// may survive. Returns the number of store keys deleted.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let start = Instant::now();

        let mut targets = self.store.scan(&self.keys.data_pattern(pattern)).await;
        targets.extend(self.store.scan(&self.keys.meta_pattern(pattern)).await);
        targets.retain(|k| matches!(self.keys.classify(k), Some(KeyKind::Data(_) | KeyKind::Meta(_))));
        targets.sort_unstable();
        targets.dedup();

        let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let deleted = self.store.delete(&refs).await;
        if let Some(local) = &self.local {
            local.remove_matching(pattern);
        }

        info!(target: LOG_TARGET, pattern = %pattern, deleted, "Invalidated keys");
        self.metrics
            .record_latency(CacheOperation::Invalidate, start.elapsed());
        deleted
    }

    /// Delete everything under the prefix except locks
    pub async fn flush(&self) -> u64 {
        self.invalidate("*").await
    }

    /// Readiness, approximate key counts and process-local counters
    ///
    /// Counts come from a full SCAN of the prefix: diagnostics only, keep it
    /// off request paths.
    pub async fn stats(&self) -> CacheStats {
        let start = Instant::now();

        let ready = match self.store.state() {
            StoreState::Connecting => self.store.ping().await,
            state => state == StoreState::Ready,
        };

        let mut stats = self.counters.snapshot();
        stats.enabled = self.store.is_enabled();
        stats.ready = ready;
        stats.store_errors = self.store.error_count();

        if ready {
            for key in self.store.scan(&self.keys.data_pattern("*")).await {
                match self.keys.classify(&key) {
                    Some(KeyKind::Data(_)) => stats.keys += 1,
                    Some(KeyKind::Meta(_)) => stats.meta_keys += 1,
                    Some(KeyKind::Lock(_)) => stats.locks += 1,
                    None => {}
                }
            }
        }

        self.metrics.record_latency(CacheOperation::Stats, start.elapsed());
        stats
    }

    /// Startup ping with backoff; the cache works either way
    pub async fn connect(&self) -> bool {
        self.store.connect().await
    }

    /// Explicit reconnect attempt after the store was given up on
    pub async fn reconnect(&self) -> bool {
        self.store.reconnect().await
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// MISS branch: recompute under the lock or wait for whoever holds it
    async fn fill<T, E, F, Fut>(&self, key: &str, options: SwrOptions, generator: F) -> SwrResponse<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if !self.locks.acquire(key).await {
            self.contended(key);
            tokio::time::sleep(self.config.lock_wait).await;

            // Straight from the store: the lock holder may have just written it
            return match self.lookup::<T>(key, Source::Store).await {
                Lookup::Fresh { value, age } => {
                    let status = ready_status(&value);
                    SwrResponse::cached(value, status, age)
                }
                Lookup::Stale { value, age } => SwrResponse::cached(value, CacheStatus::Stale, Some(age)),
                Lookup::Miss => SwrResponse::nothing(CacheStatus::Refreshing),
            };
        }

        let computed = self.compute(key, options, generator).await;
        self.locks.release(key).await;

        match computed {
            Computed::Value(value) => {
                self.counters.refresh_succeeded();
                self.metrics.record_refresh(key, RefreshOutcome::Success, false);
                let status = ready_status(&value);
                SwrResponse::computed(value, status)
            }
            Computed::Failed(message) => {
                warn!(target: LOG_TARGET, key = %key, error = %message, "Generator failed");
                self.counters.refresh_failed();
                self.counters.timeout();
                self.metrics.record_refresh(key, RefreshOutcome::Failed, false);
                self.fallback(key).await
            }
            Computed::TimedOut => {
                warn!(
                    target: LOG_TARGET,
                    key = %key,
                    timeout_ms = options.timeout.as_millis() as u64,
                    "Generator exceeded its budget"
                );
                self.counters.timeout();
                self.metrics.record_refresh(key, RefreshOutcome::TimedOut, false);
                self.fallback(key).await
            }
        }
    }

    /// Race the generator against `options.timeout`, persisting a value
    /// that arrives in time (and, under [`LateResultPolicy::Persist`], one
    /// that arrives later)
    async fn compute<T, E, F, Fut>(&self, key: &str, options: SwrOptions, generator: F) -> Computed<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.config.late_results {
            LateResultPolicy::Discard => match guarded(options.timeout, generator).await {
                Computed::Value(value) => {
                    if let Some((payload, meta, ttl)) = self.encode_record(key, &value, options) {
                        self.write_record(key, payload, meta, ttl).await;
                    }
                    Computed::Value(value)
                }
                other => other,
            },
            LateResultPolicy::Persist => {
                let pending = self.spawn_detached(key.to_string(), options, generator);
                match tokio::time::timeout(options.timeout, pending).await {
                    Ok(Ok(Ok(value))) => Computed::Value(value),
                    Ok(Ok(Err(message))) => Computed::Failed(message),
                    Ok(Err(_)) => Computed::Failed("generator task ended without a result".to_string()),
                    Err(_) => Computed::TimedOut,
                }
            }
        }
    }

    /// Plain read of the data key after a failed recompute, ignoring meta
    async fn fallback<T>(&self, key: &str) -> SwrResponse<T>
    where
        T: DeserializeOwned,
    {
        let value = match self.store.get(&self.keys.data_key(key)).await {
            Some(bytes) => self.decode::<T>(key, &bytes),
            None => None,
        };
        match value {
            Some(value) => SwrResponse::cached(value, CacheStatus::Timeout, None),
            None => SwrResponse::nothing(CacheStatus::Timeout),
        }
    }

    /// Read value and meta in one round trip and classify by age
    ///
    /// Only fresh records read from the store are memoised locally; a local
    /// copy that no longer classifies as usable is evicted.
    async fn lookup<T>(&self, key: &str, source: Source) -> Lookup<T>
    where
        T: DeserializeOwned,
    {
        let Some(record) = self.read_record(key, source).await else {
            return Lookup::Miss;
        };

        let now = SystemTime::now();
        let (freshness, age) = match &record.meta {
            Some(meta) => (meta.freshness_at(now), Some(meta.age_at(now))),
            // Plain `set` value: the store TTL bounds its life
            None => (Freshness::Fresh, None),
        };
        let value = match freshness {
            Freshness::Expired => None,
            _ => self.decode::<T>(key, &record.value),
        };

        let Some(value) = value else {
            if !record.from_store {
                self.evict_local(key);
            }
            return Lookup::Miss;
        };

        match freshness {
            Freshness::Fresh => {
                if record.from_store {
                    if let Some(local) = &self.local {
                        local.put(key, record.value, record.raw_meta);
                    }
                }
                Lookup::Fresh { value, age }
            }
            Freshness::Stale => Lookup::Stale {
                value,
                age: age.unwrap_or_default(),
            },
            Freshness::Expired => Lookup::Miss,
        }
    }

    async fn read_record(&self, key: &str, source: Source) -> Option<Record> {
        let cached = match source {
            Source::Any => self.local.as_ref().and_then(|local| local.get(key)),
            Source::Store => None,
        };

        let (value, raw_meta, from_store) = match cached {
            Some((value, meta)) => (value, meta, false),
            None => {
                let data_key = self.keys.data_key(key);
                let meta_key = self.keys.meta_key(key);
                let mut values = self
                    .store
                    .get_many(&[data_key.as_str(), meta_key.as_str()])
                    .await
                    .into_iter();
                let value = values.next().flatten()?;
                (value, values.next().flatten(), true)
            }
        };

        let meta = raw_meta.as_deref().and_then(|bytes| match self.codec.decode_meta(bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(target: LOG_TARGET, key = %key, error = %e, "Ignoring unreadable metadata");
                None
            }
        });
        Some(Record {
            value,
            meta,
            raw_meta,
            from_store,
        })
    }

    /// Encode and store value plus fresh metadata
    async fn persist<T>(&self, key: &str, value: &T, options: SwrOptions) -> bool
    where
        T: Serialize,
    {
        match self.encode_record(key, value, options) {
            Some((payload, meta, ttl)) => self.write_record(key, payload, meta, ttl).await,
            None => false,
        }
    }

    /// Value and meta bytes plus the store TTL (`stale_ttl`)
    fn encode_record<T>(&self, key: &str, value: &T, options: SwrOptions) -> Option<(Vec<u8>, Vec<u8>, Duration)>
    where
        T: Serialize,
    {
        let meta = CacheMeta::new(options.ttl, options.stale_ttl).with_status(ready_status(value));
        let encoded = self
            .codec
            .encode_value(value)
            .and_then(|payload| Ok((payload, self.codec.encode_meta(&meta)?)));

        match encoded {
            Ok((payload, meta_bytes)) => Some((payload, meta_bytes, meta.stale_ttl())),
            Err(e) => {
                warn!(target: LOG_TARGET, key = %key, error = %e, "Failed to encode value");
                None
            }
        }
    }

    /// Value and meta in one round trip
    async fn write_record(&self, key: &str, payload: Vec<u8>, meta: Vec<u8>, ttl: Duration) -> bool {
        let data_key = self.keys.data_key(key);
        let meta_key = self.keys.meta_key(key);
        let written = self
            .store
            .set_many(
                &[
                    (data_key.as_str(), payload.as_slice()),
                    (meta_key.as_str(), meta.as_slice()),
                ],
                ttl,
            )
            .await;

        if let Some(local) = &self.local {
            local.put(key, payload, Some(meta));
        }
        written
    }

    fn decode<T>(&self, key: &str, bytes: &[u8]) -> Option<T>
    where
        T: DeserializeOwned,
    {
        match self.codec.decode_value(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(target: LOG_TARGET, key = %key, error = %e, "Treating undecodable value as a miss");
                None
            }
        }
    }

    /// Reserved keys would alias another key's metadata or lock
    fn rejects(&self, key: &str) -> bool {
        if KeySpace::is_reserved(key) {
            warn!(target: LOG_TARGET, key = %key, "Reserved key prefix; bypassing the cache");
            return true;
        }
        false
    }

    /// Generator only, nothing read or stored
    async fn uncached<T, E, F, Fut>(&self, options: SwrOptions, generator: F) -> SwrResponse<T>
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match guarded(options.timeout, generator).await {
            Computed::Value(value) => {
                let status = ready_status(&value);
                SwrResponse::computed(value, status)
            }
            Computed::Failed(_) | Computed::TimedOut => SwrResponse::nothing(CacheStatus::Timeout),
        }
    }

    fn evict_local(&self, key: &str) {
        if let Some(local) = &self.local {
            local.remove(key);
        }
    }

    fn contended(&self, key: &str) {
        self.counters.lock_contended();
        self.metrics.record_lock_contention(key);
    }
}

impl<S, Z, C, M> Clone for CacheOrchestrator<S, Z, C, M>
where
    S: CacheStore,
    Z: Serializer,
    C: Compressor,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
            metrics: self.metrics.clone(),
            keys: self.keys.clone(),
            locks: self.locks.clone(),
            local: self.local.clone(),
            config: self.config.clone(),
            counters: self.counters.clone(),
        }
    }
}

/// Run `generator` as its own task within `budget`
///
/// A panic comes back as `Failed`; at the deadline the task is aborted.
async fn guarded<T, E, F, Fut>(budget: Duration, generator: F) -> Computed<T>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let mut task = tokio::spawn(async move { generator().await });
    match tokio::time::timeout(budget, &mut task).await {
        Ok(Ok(Ok(value))) => Computed::Value(value),
        Ok(Ok(Err(e))) => Computed::Failed(e.to_string()),
        Ok(Err(e)) => Computed::Failed(format!("generator task failed: {e}")),
        Err(_) => {
            task.abort();
            Computed::TimedOut
        }
    }
}

/// `Empty` for null, `[]`, `{}` and `""`, otherwise `Ready`
fn ready_status<T: Serialize>(value: &T) -> CacheStatus {
    if is_semantically_empty(value) {
        CacheStatus::Empty
    } else {
        CacheStatus::Ready
    }
}

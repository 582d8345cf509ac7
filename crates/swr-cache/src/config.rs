//! Orchestrator configuration

use std::time::Duration;

use swr_cache_storage::AdapterConfig;

use crate::local::DEFAULT_LOCAL_CAPACITY;

/// What happens to a generator result that arrives after its `timeout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LateResultPolicy {
    /// Keep the generator running detached and store its value when it
    /// resolves (bounded by the lock TTL)
    #[default]
    Persist,
    /// Drop the generator future at the deadline
    Discard,
}

/// Process-wide settings for a [`CacheOrchestrator`](crate::CacheOrchestrator)
///
/// `ttl`, `stale_ttl` and `timeout` are per call (see
/// [`SwrOptions`](crate::SwrOptions)); this only carries what is fixed at
/// startup.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Application prefix for every key
    pub prefix: String,
    /// Refresh lock lifetime; keep it above the worst-case generator latency
    pub lock_ttl: Duration,
    /// How long a caller that lost the lock waits before re-reading
    pub lock_wait: Duration,
    pub late_results: LateResultPolicy,
    /// Enables the in-process layer in front of the store
    pub local_ttl: Option<Duration>,
    /// Entry bound for the in-process layer
    pub local_capacity: usize,
    pub adapter: AdapterConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "app".to_string(),
            lock_ttl: Duration::from_secs(30),
            lock_wait: Duration::from_millis(500),
            late_results: LateResultPolicy::Persist,
            local_ttl: None,
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            adapter: AdapterConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create config with a key prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Defaults, with `CACHE_PREFIX` for the prefix and `REDIS_ENABLED`
    /// for the master switch
    pub fn from_env() -> Self {
        let prefix = std::env::var("CACHE_PREFIX")
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "app".to_string());
        Self {
            prefix,
            adapter: AdapterConfig::from_env(),
            ..Default::default()
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn late_results(mut self, policy: LateResultPolicy) -> Self {
        self.late_results = policy;
        self
    }

    /// Memoise store reads in process for `ttl`
    pub fn local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = Some(ttl);
        self
    }

    /// Cap the in-process layer at `capacity` entries
    pub fn local_capacity(mut self, capacity: usize) -> Self {
        self.local_capacity = capacity;
        self
    }

    pub fn adapter(mut self, adapter: AdapterConfig) -> Self {
        self.adapter = adapter;
        self
    }

    /// Never touch the store; every lookup recomputes
    pub fn disabled(mut self) -> Self {
        self.adapter = AdapterConfig::disabled();
        self
    }
}

//! Metrics trait for cache observability

use std::time::Duration;

/// Orchestrator operation for latency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Get,
    Set,
    GetOrSet,
    StaleWhileRevalidate,
    Delete,
    Invalidate,
    Stats,
}

impl CacheOperation {
    /// Get operation as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Get => "get",
            CacheOperation::Set => "set",
            CacheOperation::GetOrSet => "get_or_set",
            CacheOperation::StaleWhileRevalidate => "swr",
            CacheOperation::Delete => "delete",
            CacheOperation::Invalidate => "invalidate",
            CacheOperation::Stats => "stats",
        }
    }
}

/// How a recompute ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
    /// Value computed and persisted
    Success,
    /// Generator returned an error
    Failed,
    /// Generator exceeded its budget
    TimedOut,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Failed => "failed",
            RefreshOutcome::TimedOut => "timed_out",
        }
    }
}

/// Trait for cache metrics/observability
///
/// Implement this to integrate with your metrics system (Prometheus, StatsD, etc.)
pub trait CacheMetrics: Send + Sync + 'static {
    /// Fresh hit
    fn record_hit(&self, key: &str);

    /// Served stale while revalidating
    fn record_stale_hit(&self, key: &str);

    /// Nothing usable in the store
    fn record_miss(&self, key: &str);

    /// A recompute finished; `background` is true for SWR refreshes
    fn record_refresh(&self, key: &str, outcome: RefreshOutcome, background: bool);

    /// Another process held the refresh lock
    fn record_lock_contention(&self, key: &str);

    /// Record operation latency
    fn record_latency(&self, operation: CacheOperation, duration: Duration);
}

/// No-op metrics implementation (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_hit(&self, _key: &str) {}

    #[inline]
    fn record_stale_hit(&self, _key: &str) {}

    #[inline]
    fn record_miss(&self, _key: &str) {}

    #[inline]
    fn record_refresh(&self, _key: &str, _outcome: RefreshOutcome, _background: bool) {}

    #[inline]
    fn record_lock_contention(&self, _key: &str) {}

    #[inline]
    fn record_latency(&self, _operation: CacheOperation, _duration: Duration) {}
}

/// Metrics adapter using the `metrics` crate
///
/// # Example
/// ```ignore
/// use swr_cache_core::MetricsCrateAdapter;
///
/// let metrics = MetricsCrateAdapter::new("swr_cache");
/// // Emits: swr_cache_hits_total, swr_cache_refreshes_total{outcome,mode}, ...
/// ```
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsCrateAdapter {
    prefix: String,
}

#[cfg(feature = "metrics")]
impl MetricsCrateAdapter {
    /// Create a new adapter with the given metric name prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn metric_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

#[cfg(feature = "metrics")]
impl CacheMetrics for MetricsCrateAdapter {
    fn record_hit(&self, _key: &str) {
        metrics::counter!(self.metric_name("hits_total")).increment(1);
    }

    fn record_stale_hit(&self, _key: &str) {
        metrics::counter!(self.metric_name("stale_hits_total")).increment(1);
    }

    fn record_miss(&self, _key: &str) {
        metrics::counter!(self.metric_name("misses_total")).increment(1);
    }

    fn record_refresh(&self, _key: &str, outcome: RefreshOutcome, background: bool) {
        let mode = if background { "background" } else { "foreground" };
        metrics::counter!(
            self.metric_name("refreshes_total"),
            "outcome" => outcome.as_str(),
            "mode" => mode
        )
        .increment(1);
    }

    fn record_lock_contention(&self, _key: &str) {
        metrics::counter!(self.metric_name("lock_contention_total")).increment(1);
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        metrics::histogram!(
            self.metric_name("operation_duration_seconds"),
            "operation" => operation.as_str()
        )
        .record(duration.as_secs_f64());
    }
}

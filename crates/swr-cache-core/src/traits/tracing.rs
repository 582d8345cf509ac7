use crate::{CacheMetrics, CacheOperation, RefreshOutcome, LOG_TARGET};
use std::time::Duration;
use tracing::{debug, trace};

/// Metrics adapter that logs events via `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Service name/prefix (optional)
    service_name: Option<String>,
}

impl TracingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with service name prefix
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl CacheMetrics for TracingMetrics {
    fn record_hit(&self, key: &str) {
        debug!(
            target: LOG_TARGET,
            event = "hit",
            key = %key,
            service = ?self.service_name,
            "Cache Hit"
        );
    }

    fn record_stale_hit(&self, key: &str) {
        debug!(
            target: LOG_TARGET,
            event = "stale_hit",
            key = %key,
            service = ?self.service_name,
            "Cache Stale Hit"
        );
    }

    fn record_miss(&self, key: &str) {
        debug!(
            target: LOG_TARGET,
            event = "miss",
            key = %key,
            service = ?self.service_name,
            "Cache Miss"
        );
    }

    fn record_refresh(&self, key: &str, outcome: RefreshOutcome, background: bool) {
        debug!(
            target: LOG_TARGET,
            event = "refresh",
            key = %key,
            outcome = outcome.as_str(),
            background,
            service = ?self.service_name,
            "Cache Refresh"
        );
    }

    fn record_lock_contention(&self, key: &str) {
        debug!(
            target: LOG_TARGET,
            event = "lock_contention",
            key = %key,
            service = ?self.service_name,
            "Refresh Lock Held Elsewhere"
        );
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        trace!(
            target: LOG_TARGET,
            event = "latency",
            operation = operation.as_str(),
            duration_ms = duration.as_millis() as u64,
            service = ?self.service_name,
            "Cache Operation Latency"
        );
    }
}

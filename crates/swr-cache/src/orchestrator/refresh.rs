//! Work that outlives the triggering call
//!
//! Both kinds of task are spawned on the runtime and never awaited by the
//! caller; their failures end up in logs and counters only.

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use swr_cache_core::{CacheMetrics, CacheStore, Compressor, LOG_TARGET, RefreshOutcome, Serializer, SwrOptions};

use super::{CacheOrchestrator, Computed, guarded};

impl<S, Z, C, M> CacheOrchestrator<S, Z, C, M>
where
    S: CacheStore,
    Z: Serializer,
    C: Compressor,
    M: CacheMetrics,
{
    /// Recompute a stale key in the background; the caller holds its lock
    ///
    /// The generator gets at most the lock TTL and runs as its own task, so
    /// a panic counts as a failure. On failure the stale record is left
    /// untouched. The lock is released either way.
    pub(super) fn spawn_refresh<T, E, F, Fut>(&self, key: String, options: SwrOptions, generator: F)
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.counters.refresh_started();
        let this = self.clone();

        tokio::spawn(async move {
            let budget = this.locks.ttl();
            let outcome = match guarded(budget, generator).await {
                Computed::Value(value) => {
                    let written = match this.encode_record(&key, &value, options) {
                        Some((payload, meta, ttl)) => this.write_record(&key, payload, meta, ttl).await,
                        None => false,
                    };
                    if written {
                        RefreshOutcome::Success
                    } else {
                        warn!(target: LOG_TARGET, key = %key, "Refreshed value was not stored");
                        RefreshOutcome::Failed
                    }
                }
                Computed::Failed(e) => {
                    warn!(
                        target: LOG_TARGET,
                        key = %key,
                        error = %e,
                        "Background refresh failed; keeping stale value"
                    );
                    RefreshOutcome::Failed
                }
                Computed::TimedOut => {
                    warn!(
                        target: LOG_TARGET,
                        key = %key,
                        budget_ms = budget.as_millis() as u64,
                        "Background refresh outlived the lock TTL"
                    );
                    RefreshOutcome::TimedOut
                }
            };

            this.locks.release(&key).await;
            match outcome {
                RefreshOutcome::Success => this.counters.refresh_succeeded(),
                _ => this.counters.refresh_failed(),
            }
            this.metrics.record_refresh(&key, outcome, true);
            debug!(
                target: LOG_TARGET,
                key = %key,
                outcome = outcome.as_str(),
                "Background refresh finished"
            );
        });
    }

    /// Run a foreground generator as its own task so a result arriving
    /// after the caller's timeout is still stored
    ///
    /// The value is written before it is handed back. The task is bounded
    /// by the larger of the lock TTL and the call's timeout.
    pub(super) fn spawn_detached<T, E, F, Fut>(
        &self,
        key: String,
        options: SwrOptions,
        generator: F,
    ) -> oneshot::Receiver<Result<T, String>>
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        let budget = self.locks.ttl().max(options.timeout);

        tokio::spawn(async move {
            let result = match tokio::time::timeout(budget, generator()).await {
                Ok(Ok(value)) => {
                    if let Some((payload, meta, ttl)) = this.encode_record(&key, &value, options) {
                        this.write_record(&key, payload, meta, ttl).await;
                    }
                    Ok(value)
                }
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("generator still pending after {:?}", budget)),
            };

            // Receiver gone: the caller already returned TIMEOUT
            if let Err(unclaimed) = tx.send(result) {
                match unclaimed {
                    Ok(_) => debug!(target: LOG_TARGET, key = %key, "Stored late generator result"),
                    Err(message) => warn!(
                        target: LOG_TARGET,
                        key = %key,
                        error = %message,
                        "Late generator failure"
                    ),
                }
            }
        });

        rx
    }
}

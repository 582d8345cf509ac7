//! Record metadata and freshness classification

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::status::CacheStatus;

/// Where a record sits in its lifetime at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `age <= ttl`
    Fresh,
    /// `ttl < age <= stale_ttl`
    Stale,
    /// `age > stale_ttl`; the store is expected to have evicted it already
    Expired,
}

/// Metadata stored next to every value written by the orchestrator
///
/// Serialized as JSON under `{prefix}:meta:{key}`. Timestamps are epoch
/// milliseconds so processes on different hosts agree on the encoding.
/// The status is always recomputed from `created_at` and the two TTLs;
/// the persisted `status` field is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
    /// Creation time, epoch milliseconds
    pub created_at: u64,
    /// Fresh lifetime in milliseconds
    pub ttl_ms: u64,
    /// Total storage lifetime in milliseconds, never below `ttl_ms`
    pub stale_ttl_ms: u64,
    /// Status at write time (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CacheStatus>,
}

impl CacheMeta {
    /// Metadata for a record created now
    pub fn new(ttl: Duration, stale_ttl: Duration) -> Self {
        Self::created_at(SystemTime::now(), ttl, stale_ttl)
    }

    /// Metadata for a record created at `created_at`
    ///
    /// A `stale_ttl` shorter than `ttl` is raised to `ttl`.
    pub fn created_at(created_at: SystemTime, ttl: Duration, stale_ttl: Duration) -> Self {
        let ttl_ms = duration_millis(ttl);
        Self {
            created_at: epoch_millis(created_at),
            ttl_ms,
            stale_ttl_ms: duration_millis(stale_ttl).max(ttl_ms),
            status: None,
        }
    }

    /// Attach an advisory status
    pub fn with_status(mut self, status: CacheStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn stale_ttl(&self) -> Duration {
        Duration::from_millis(self.stale_ttl_ms.max(self.ttl_ms))
    }

    /// Creation time as a `SystemTime`
    pub fn created_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.created_at)
    }

    /// Age at `now`; a creation time in the future counts as age zero
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_time()).unwrap_or_default()
    }

    pub fn age(&self) -> Duration {
        self.age_at(SystemTime::now())
    }

    pub fn freshness_at(&self, now: SystemTime) -> Freshness {
        let age = self.age_at(now);
        if age <= self.ttl() {
            Freshness::Fresh
        } else if age <= self.stale_ttl() {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(SystemTime::now())
    }
}

/// Milliseconds since the Unix epoch, zero for pre-epoch clocks
pub fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or(0)
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

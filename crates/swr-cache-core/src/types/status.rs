//! Read-time cache status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a value returned by the orchestrator
///
/// Derived per call; never trusted from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStatus {
    /// Fresh and non-empty
    Ready,
    /// Nothing usable, or the value is semantically empty
    Empty,
    /// Past its TTL but inside the stale window
    Stale,
    /// A recompute failed or ran out of time
    Timeout,
    /// A recompute is in flight elsewhere; retry later
    Refreshing,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Ready => "READY",
            CacheStatus::Empty => "EMPTY",
            CacheStatus::Stale => "STALE",
            CacheStatus::Timeout => "TIMEOUT",
            CacheStatus::Refreshing => "REFRESHING",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

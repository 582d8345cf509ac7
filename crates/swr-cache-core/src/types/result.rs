//! Response of a stale-while-revalidate lookup

use serde::{Serialize, Serializer};
use std::time::Duration;

use super::status::CacheStatus;

/// Outcome of `get_or_stale_then_refresh`
///
/// Every branch of the state machine produces one of these; errors are
/// folded into `status` and a `None` data field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwrResponse<T> {
    /// The value, if anything usable exists
    pub data: Option<T>,
    pub status: CacheStatus,
    /// `true` when `data` came from the store rather than a fresh computation
    pub from_cache: bool,
    /// Age of the served record, when known
    #[serde(rename = "ageMs", serialize_with = "serialize_age_ms")]
    pub age: Option<Duration>,
}

impl<T> SwrResponse<T> {
    pub fn new(data: Option<T>, status: CacheStatus, from_cache: bool, age: Option<Duration>) -> Self {
        Self {
            data,
            status,
            from_cache,
            age,
        }
    }

    /// A cached value served as-is
    pub fn cached(data: T, status: CacheStatus, age: Option<Duration>) -> Self {
        Self::new(Some(data), status, true, age)
    }

    /// A value computed by this call
    pub fn computed(data: T, status: CacheStatus) -> Self {
        Self::new(Some(data), status, false, Some(Duration::ZERO))
    }

    /// Nothing usable
    pub fn nothing(status: CacheStatus) -> Self {
        Self::new(None, status, false, None)
    }

    /// Whether the caller got data it can render
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Whether a retry later could produce a better answer
    pub fn should_retry(&self) -> bool {
        matches!(self.status, CacheStatus::Refreshing | CacheStatus::Timeout) && self.data.is_none()
    }

    /// Map the value if present
    pub fn map<U, F>(self, f: F) -> SwrResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        SwrResponse {
            data: self.data.map(f),
            status: self.status,
            from_cache: self.from_cache,
            age: self.age,
        }
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

fn serialize_age_ms<S: Serializer>(age: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match age {
        Some(age) => s.serialize_some(&u64::try_from(age.as_millis()).unwrap_or(u64::MAX)),
        None => s.serialize_none(),
    }
}

//! Core traits for cache operations

mod key;
mod metrics;
mod serializer;
mod store;
mod tracing;

pub use key::{CacheKey, CompositeKey, KeyKind, KeySpace};
pub use metrics::{CacheMetrics, CacheOperation, NoopMetrics, RefreshOutcome};
pub use serializer::{JsonSerializer, Serializer};
pub use store::CacheStore;
pub use self::tracing::TracingMetrics;

#[cfg(feature = "metrics")]
pub use metrics::MetricsCrateAdapter;

#[cfg(feature = "msgpack")]
pub use serializer::MsgPackSerializer;

#[cfg(feature = "bincode")]
pub use serializer::BincodeSerializer;

//! Core types for cache operations

mod meta;
mod options;
mod result;
mod stats;
mod status;

pub use meta::{epoch_millis, CacheMeta, Freshness};
pub use options::{SwrOptions, SwrOpts};
pub use result::SwrResponse;
pub use stats::CacheStats;
pub use status::CacheStatus;

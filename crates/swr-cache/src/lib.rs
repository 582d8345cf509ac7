//! swr-cache: Stale-while-revalidate caching over a shared store
//!
//! # Features
//!
//! - **Stale-while-revalidate** lookups that never block on a stale value
//! - **Distributed refresh lock** so one process recomputes a key at a time
//! - **Fail-open** store access: an outage means "always recompute", never an error
//! - **Pluggable serialization** (JSON, MessagePack, Bincode) and zstd compression
//! - **Metrics integration**
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use swr_cache::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = CacheOrchestrator::with_config(MemoryStore::new(), CacheConfig::with_prefix("app"));
//!
//!     let response = cache
//!         .get_or_stale_then_refresh(
//!             "actors:list",
//!             SwrOpts::new().ttl_secs(60).stale_ttl_secs(300).timeout(Duration::from_secs(5)),
//!             || async { Ok::<_, std::io::Error>(vec![1, 2, 3]) },
//!         )
//!         .await;
//!
//!     match response.status {
//!         CacheStatus::Ready | CacheStatus::Stale => println!("{:?}", response.data),
//!         CacheStatus::Refreshing => println!("someone else is computing it"),
//!         status => println!("degraded: {}", status),
//!     }
//! }
//! ```

mod config;
mod local;
mod lock;
mod orchestrator;

// Re-export core
pub use swr_cache_core::*;

// Re-export storage
pub use swr_cache_storage::{AdapterConfig, StoreAdapter, StoreState};

#[cfg(feature = "memory")]
pub use swr_cache_storage::MemoryStore;

#[cfg(feature = "redis")]
pub use swr_cache_storage::{RedisConfig, RedisStore};

pub use config::{CacheConfig, LateResultPolicy};
pub use local::LocalLayer;
pub use lock::LockManager;
pub use orchestrator::CacheOrchestrator;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AdapterConfig, CacheConfig, CacheError, CacheKey, CacheOrchestrator, CacheStats, CacheStatus,
        CacheStore, JsonSerializer, LateResultPolicy, Result, Serializer, SwrOptions, SwrOpts,
        SwrResponse,
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryStore;

    #[cfg(feature = "redis")]
    pub use crate::{RedisConfig, RedisStore};

    #[cfg(feature = "msgpack")]
    pub use crate::MsgPackSerializer;

    #[cfg(feature = "bincode")]
    pub use crate::BincodeSerializer;
}

#[cfg(all(test, feature = "memory"))]
mod tests;

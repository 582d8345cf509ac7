//! swr-cache-storage: Stores and the fail-open adapter for swr-cache
//!
//! - [`MemoryStore`] keeps everything in process (tests, single-node use).
//! - [`RedisStore`] talks to Redis through a `bb8` pool (feature `redis`).
//! - [`StoreAdapter`] wraps either one, tracks readiness and swallows
//!   failures so the caller always gets an answer.

mod adapter;
mod glob;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

pub use adapter::{AdapterConfig, StoreAdapter, StoreState};
pub use glob::glob_match;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStore};

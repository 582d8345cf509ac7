//! swr-cache-core: Core traits and types for the swr-cache library
//!
//! This crate provides the foundational types shared by the store
//! implementations and the orchestrator: the raw [`CacheStore`] contract,
//! record metadata, status classification and the payload codec.

mod codec;
mod compression;
mod error;
mod traits;
mod types;

pub use codec::{is_semantically_empty, Codec, FRAME_RAW, FRAME_ZSTD};
pub use compression::{Compressor, NoopCompressor, DEFAULT_COMPRESSION_LEVEL, MIN_COMPRESSION_SIZE};
pub use error::{CacheError, Result};
pub use traits::*;
pub use types::*;

#[cfg(feature = "compression")]
pub use compression::ZstdCompressor;

/// Tracing target used by every crate in the workspace
pub const LOG_TARGET: &str = "swr_cache";

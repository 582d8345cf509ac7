//! Payload compression
//!
//! Aggregation results can be large; compressing them trades a little CPU
//! for less store memory and fewer bytes on the wire. The [`Codec`](crate::Codec)
//! decides per payload and records the choice in a frame tag.

use crate::CacheError;

/// Compression level (1-22, higher = better compression but slower)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Payloads smaller than this are stored raw
pub const MIN_COMPRESSION_SIZE: usize = 1024;

/// Trait for compression implementations
pub trait Compressor: Send + Sync + Clone + 'static {
    /// Name of the compressor
    fn name(&self) -> &str;

    /// Whether a payload of `len` bytes is worth compressing
    fn should_compress(&self, len: usize) -> bool;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CacheError>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CacheError>;
}

/// Compression disabled; every payload is stored raw
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn name(&self) -> &str {
        "none"
    }

    fn should_compress(&self, _len: usize) -> bool {
        false
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CacheError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, _data: &[u8]) -> Result<Vec<u8>, CacheError> {
        // Only reachable when a zstd-framed payload was written by a
        // process with compression enabled.
        Err(CacheError::Decompression(
            "payload is compressed but compression is disabled".to_string(),
        ))
    }
}

/// Zstd compressor
#[cfg(feature = "compression")]
#[derive(Debug, Clone)]
pub struct ZstdCompressor {
    level: i32,
    min_size: usize,
}

#[cfg(feature = "compression")]
impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

#[cfg(feature = "compression")]
impl ZstdCompressor {
    /// Create a new zstd compressor with the given level (clamped to 1-22)
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(1, 22),
            min_size: MIN_COMPRESSION_SIZE,
        }
    }

    /// Set the minimum payload size that gets compressed
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

#[cfg(feature = "compression")]
impl Compressor for ZstdCompressor {
    fn name(&self) -> &str {
        "zstd"
    }

    fn should_compress(&self, len: usize) -> bool {
        len >= self.min_size
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CacheError> {
        zstd::encode_all(data, self.level).map_err(|e| CacheError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CacheError> {
        zstd::decode_all(data).map_err(|e| CacheError::Decompression(e.to_string()))
    }
}

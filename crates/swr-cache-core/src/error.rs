//! Error types for cache operations
//!
//! Only the raw store and codec layers return these. The orchestrator
//! absorbs every variant and maps it onto a [`CacheStatus`](crate::CacheStatus).

use thiserror::Error;

/// Main error type for store and codec operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Store unreachable or connection dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// Store rejected or failed a command
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored payload could not be decoded
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Decompression failed
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Caller-supplied generator failed
    #[error("generator failed for key {key}: {message}")]
    Generator { key: String, message: String },

    /// Timeout
    #[error("operation timed out")]
    Timeout,

    /// Cache disabled by configuration
    #[error("cache disabled")]
    Disabled,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Whether this error means the store itself is unhealthy
    /// (as opposed to a bad payload)
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::Connection(_) | CacheError::Timeout)
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

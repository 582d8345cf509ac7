//! Value and metadata encoding for store payloads
//!
//! Values are framed with a one-byte tag so that a reader can tell raw from
//! compressed payloads regardless of its own compression settings:
//!
//! ```text
//! +-----+----------------------+
//! | tag | serialized value ... |
//! +-----+----------------------+
//! ```
//!
//! Metadata is always plain JSON so it stays inspectable from `redis-cli`.

use serde::{de::DeserializeOwned, Serialize};

use crate::{CacheError, CacheMeta, Compressor, JsonSerializer, NoopCompressor, Result, Serializer};

/// Frame tag: payload stored as serialized
pub const FRAME_RAW: u8 = 0;
/// Frame tag: payload zstd-compressed after serialization
pub const FRAME_ZSTD: u8 = 1;

#[derive(Debug, Clone, Default)]
pub struct Codec<S = JsonSerializer, C = NoopCompressor> {
    serializer: S,
    compressor: C,
}

impl Codec<JsonSerializer, NoopCompressor> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Serializer, C: Compressor> Codec<S, C> {
    pub fn with_parts(serializer: S, compressor: C) -> Self {
        Self {
            serializer,
            compressor,
        }
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    pub fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let body = self.serializer.serialize(value)?;
        if self.compressor.should_compress(body.len()) {
            let packed = self.compressor.compress(&body)?;
            if packed.len() < body.len() {
                return Ok(frame(FRAME_ZSTD, &packed));
            }
        }
        Ok(frame(FRAME_RAW, &body))
    }

    pub fn decode_value<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T> {
        match payload.split_first() {
            Some((&FRAME_RAW, body)) => self.serializer.deserialize(body),
            Some((&FRAME_ZSTD, body)) => {
                let body = self.compressor.decompress(body)?;
                self.serializer.deserialize(&body)
            }
            Some((tag, _)) => Err(CacheError::Deserialization(format!(
                "unknown frame tag {tag}"
            ))),
            None => Err(CacheError::Deserialization("empty payload".to_string())),
        }
    }

    pub fn encode_meta(&self, meta: &CacheMeta) -> Result<Vec<u8>> {
        serde_json::to_vec(meta).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    pub fn decode_meta(&self, payload: &[u8]) -> Result<CacheMeta> {
        serde_json::from_slice(payload).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

fn frame(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(tag);
    out.extend_from_slice(body);
    out
}

/// Whether a value carries no information worth serving as `READY`:
/// `null`, `[]`, `{}` or `""`
pub fn is_semantically_empty<T: Serialize>(value: &T) -> bool {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) => true,
        Ok(serde_json::Value::Array(items)) => items.is_empty(),
        Ok(serde_json::Value::Object(fields)) => fields.is_empty(),
        Ok(serde_json::Value::String(s)) => s.is_empty(),
        Ok(_) => false,
        // Not representable as JSON (e.g. non-string map keys); assume content
        Err(_) => false,
    }
}

//! Cache keys and the store key layout

use std::fmt::Display;

/// Trait for types that can be used as cache keys
///
/// The key is relative to the application prefix; [`KeySpace`] turns it
/// into the data, metadata and lock keys actually stored.
pub trait CacheKey: Send + Sync {
    /// Generate the key string
    fn cache_key(&self) -> String;
}

impl CacheKey for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

impl CacheKey for &str {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl CacheKey for &String {
    fn cache_key(&self) -> String {
        (*self).clone()
    }
}

impl<T1: Display + Send + Sync, T2: Display + Send + Sync> CacheKey for (T1, T2) {
    fn cache_key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

impl<T1: Display + Send + Sync, T2: Display + Send + Sync, T3: Display + Send + Sync> CacheKey
    for (T1, T2, T3)
{
    fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.0, self.1, self.2)
    }
}

/// Colon-joined key built from parts, e.g. `wallets:42:summary`
#[derive(Debug, Clone, Default)]
pub struct CompositeKey {
    parts: Vec<String>,
}

impl CompositeKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part to the key
    pub fn part(mut self, part: impl Display) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Add multiple parts
    pub fn parts<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Display,
    {
        self.parts.extend(parts.into_iter().map(|p| p.to_string()));
        self
    }
}

impl CacheKey for CompositeKey {
    fn cache_key(&self) -> String {
        self.parts.join(":")
    }
}

const META_SEGMENT: &str = "meta:";
const LOCK_SEGMENT: &str = "lock:";

/// Store key layout under one process-wide prefix
///
/// - data: `{prefix}:{key}`
/// - metadata: `{prefix}:meta:{key}`
/// - lock: `{prefix}:lock:{key}`
///
/// A relative key starting with `meta:` or `lock:` would land inside the
/// metadata or lock namespace of another key; such keys are reserved (see
/// [`KeySpace::is_reserved`]) and the orchestrator never stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn data_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub fn meta_key(&self, key: &str) -> String {
        format!("{}:{}{}", self.prefix, META_SEGMENT, key)
    }

    pub fn lock_key(&self, key: &str) -> String {
        format!("{}:{}{}", self.prefix, LOCK_SEGMENT, key)
    }

    /// Glob matching data keys (and, because `*` crosses `:`, possibly
    /// metadata and lock keys too; see [`KeySpace::classify`])
    pub fn data_pattern(&self, pattern: &str) -> String {
        self.data_key(pattern)
    }

    pub fn meta_pattern(&self, pattern: &str) -> String {
        self.meta_key(pattern)
    }

    pub fn lock_pattern(&self, pattern: &str) -> String {
        self.lock_key(pattern)
    }

    /// Whether a relative key collides with the metadata or lock namespace
    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(META_SEGMENT) || key.starts_with(LOCK_SEGMENT)
    }

    /// Which namespace a fully qualified store key belongs to
    pub fn classify<'a>(&self, full_key: &'a str) -> Option<KeyKind<'a>> {
        let rest = full_key
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix(':')?;
        if let Some(key) = rest.strip_prefix(META_SEGMENT) {
            Some(KeyKind::Meta(key))
        } else if let Some(key) = rest.strip_prefix(LOCK_SEGMENT) {
            Some(KeyKind::Lock(key))
        } else {
            Some(KeyKind::Data(rest))
        }
    }
}

/// A store key resolved back to its namespace and relative key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind<'a> {
    Data(&'a str),
    Meta(&'a str),
    Lock(&'a str),
}

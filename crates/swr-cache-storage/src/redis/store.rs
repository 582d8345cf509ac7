use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::RedisError;
use std::time::Duration;

use swr_cache_core::{CacheError, CacheStore, LOG_TARGET, Result};

use super::config::RedisConfig;

const SCAN_COUNT: usize = 1000;

/// Redis-backed [`CacheStore`]
///
/// The pool is built lazily: construction never touches the network, so an
/// unreachable server surfaces as per-call [`CacheError::Connection`]
/// errors that the adapter absorbs.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool<RedisConnectionManager>,
    config: RedisConfig,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("db", &self.config.db)
            .finish()
    }
}

impl RedisStore {
    /// Create a new Redis store
    ///
    /// Fails only when the connection URL is malformed.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build_unchecked(manager);

        tracing::debug!(
            target: LOG_TARGET,
            host = %config.host,
            port = config.port,
            db = config.db,
            "Redis pool created"
        );

        Ok(Self { pool, config })
    }

    /// Create from `REDIS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(RedisConfig::from_env())
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get connection from pool
    async fn get_connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

fn map_err(e: RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        CacheError::Connection(e.to_string())
    } else if e.is_timeout() {
        CacheError::Timeout
    } else {
        CacheError::Backend(e.to_string())
    }
}

fn px(ttl: Duration) -> u64 {
    ttl.as_millis().min(u64::MAX as u128) as u64
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(map_err)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get_connection().await?;
        redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut *conn)
            .await
            .map_err(map_err)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if !ttl.is_zero() {
            cmd.arg("PX").arg(px(ttl));
        }
        cmd.query_async::<()>(&mut *conn).await.map_err(map_err)
    }

    async fn set_many(&self, entries: &[(&str, &[u8])], ttl: Duration) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.get_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            let cmd = pipe.cmd("SET").arg(*key).arg(*value);
            if !ttl.is_zero() {
                cmd.arg("PX").arg(px(ttl));
            }
            cmd.ignore();
        }

        pipe.query_async::<()>(&mut *conn).await.map_err(map_err)
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !ttl.is_zero() {
            cmd.arg("PX").arg(px(ttl));
        }
        // Reply is OK when created, nil when the key already exists
        let reply: Option<String> = cmd.query_async(&mut *conn).await.map_err(map_err)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_connection().await?;

        let mut deleted = 0u64;
        for chunk in keys.chunks(self.config.delete_batch.max(1)) {
            let count: u64 = redis::cmd("DEL")
                .arg(chunk)
                .query_async(&mut *conn)
                .await
                .map_err(map_err)?;
            deleted += count;
        }
        Ok(deleted)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let mut found = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut *conn)
                .await
                .map_err(map_err)?;

            found.extend(keys);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map(|_| ())
            .map_err(map_err)
    }
}

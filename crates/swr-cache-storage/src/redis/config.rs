//! Configuration for the Redis store

use std::time::Duration;

/// Connection settings for [`RedisStore`](super::RedisStore)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,

    /// Connection pool size
    pub pool_size: u32,

    /// How long to wait for a pooled connection
    pub connection_timeout: Duration,

    /// Keys deleted per DEL call when clearing large sets
    pub delete_batch: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            delete_batch: 500,
        }
    }
}

impl RedisConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Load from `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD` and `REDIS_DB`
    ///
    /// Missing or unparsable values fall back to the defaults
    /// (`localhost:6379`, no password, db 0).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let password = std::env::var("REDIS_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());

        Self {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: parse_env("REDIS_PORT").unwrap_or(defaults.port),
            password,
            db: parse_env("REDIS_DB").unwrap_or(defaults.db),
            ..defaults
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    /// Set pool size
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Connection URL in `redis://[:password@]host:port/db` form
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

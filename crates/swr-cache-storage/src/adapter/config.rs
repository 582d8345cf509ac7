use std::time::Duration;

/// Adapter behavior on top of a raw store
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Master switch; when false nothing ever touches the store
    pub enabled: bool,
    /// Pings attempted after a failure before giving up
    pub ping_attempts: u32,
    /// Delay before the second ping; doubles on each attempt
    pub ping_base_delay: Duration,
    /// Upper bound for a single backoff delay
    pub ping_max_delay: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_attempts: 5,
            ping_base_delay: Duration::from_millis(200),
            ping_max_delay: Duration::from_secs(5),
        }
    }
}

impl AdapterConfig {
    /// Adapter that never contacts the store
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Defaults, with `REDIS_ENABLED` toggling the master switch
    ///
    /// Anything other than `false`/`0`/`no`/`off` (case-insensitive)
    /// leaves the cache enabled.
    pub fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(true);
        Self {
            enabled,
            ..Default::default()
        }
    }

    pub fn ping_attempts(mut self, attempts: u32) -> Self {
        self.ping_attempts = attempts;
        self
    }

    pub fn ping_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.ping_base_delay = base;
        self.ping_max_delay = max;
        self
    }

    /// Delay after the given zero-based failed ping, with up to 10% jitter
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self
            .ping_base_delay
            .saturating_mul(factor)
            .min(self.ping_max_delay);
        let jitter_ms = (delay.as_millis() as u64) / 10;
        if jitter_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(rand::random::<u64>() % jitter_ms)
        }
    }
}

//! Per-call options for stale-while-revalidate lookups

use std::time::Duration;

/// Lifetimes and budget for one `get_or_stale_then_refresh` call
///
/// There is no global default; [`SwrOptions::default`] only carries the
/// documented starting point (1 minute fresh, 5 minutes total, 10 second
/// budget). Keep the orchestrator's lock TTL above the worst-case
/// generator latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwrOptions {
    /// Fresh lifetime
    pub ttl: Duration,
    /// Total storage lifetime; values below `ttl` are raised to `ttl`
    pub stale_ttl: Duration,
    /// Foreground recompute budget on a miss
    pub timeout: Duration,
}

impl Default for SwrOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            stale_ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
        }
    }
}

impl SwrOptions {
    pub fn new(ttl: Duration, stale_ttl: Duration, timeout: Duration) -> Self {
        Self {
            ttl,
            stale_ttl,
            timeout,
        }
        .normalized()
    }

    /// Enforce `stale_ttl >= ttl`
    pub fn normalized(mut self) -> Self {
        if self.stale_ttl < self.ttl {
            self.stale_ttl = self.ttl;
        }
        self
    }
}

/// Builder for [`SwrOptions`] with fluent API
#[derive(Debug, Clone, Default)]
pub struct SwrOpts(SwrOptions);

impl SwrOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fresh lifetime
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.0.ttl = duration;
        self
    }

    pub fn ttl_secs(self, seconds: u64) -> Self {
        self.ttl(Duration::from_secs(seconds))
    }

    /// Set total storage lifetime
    pub fn stale_ttl(mut self, duration: Duration) -> Self {
        self.0.stale_ttl = duration;
        self
    }

    pub fn stale_ttl_secs(self, seconds: u64) -> Self {
        self.stale_ttl(Duration::from_secs(seconds))
    }

    /// Set the foreground recompute budget
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.0.timeout = duration;
        self
    }

    pub fn timeout_ms(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    pub fn build(self) -> SwrOptions {
        self.0.normalized()
    }
}

impl From<SwrOpts> for SwrOptions {
    fn from(opts: SwrOpts) -> Self {
        opts.build()
    }
}

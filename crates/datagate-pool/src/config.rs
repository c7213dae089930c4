//! Pool configuration.

use std::time::Duration;

use datagate_core::{Error, PoolErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool.
///
/// # Example
///
/// ```ignore
/// let config = PoolConfig::new(10)
///     .min_connections(2)
///     .max_lifetime(Duration::from_secs(30 * 60))
///     .idle_timeout(Duration::from_secs(5 * 60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of open connections.
    pub max_connections: usize,
    /// Connections kept open by `warm_up`.
    pub min_connections: usize,
    /// Connections older than this are closed instead of reused.
    pub max_lifetime: Option<Duration>,
    /// Connections idle longer than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
    /// How long `acquire` waits for a free slot.
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Self::default()
        }
    }

    pub fn min_connections(mut self, n: usize) -> Self {
        self.min_connections = n;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Reject configurations the pool cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::pool(
                PoolErrorKind::Config,
                "max_connections must be at least 1",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::pool(
                PoolErrorKind::Config,
                format!(
                    "min_connections ({}) exceeds max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            max_lifetime: Some(Duration::from_secs(60 * 60)),
            idle_timeout: Some(Duration::from_secs(30 * 60)),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Externally supplied pool settings, lifetimes in minutes.
///
/// Field names follow the settings file layout (`MaxConns`, `MinConns`,
/// `MaxConnLifetime`, `MaxConnIdleTime`). A lifetime of 0 disables the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoolSettings {
    pub max_conns: u32,
    #[serde(default)]
    pub min_conns: u32,
    #[serde(default)]
    pub max_conn_lifetime: u64,
    #[serde(default)]
    pub max_conn_idle_time: u64,
}

fn minutes(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n.saturating_mul(60)))
}

impl From<PoolSettings> for PoolConfig {
    fn from(settings: PoolSettings) -> Self {
        PoolConfig {
            max_connections: settings.max_conns as usize,
            min_connections: settings.min_conns as usize,
            max_lifetime: minutes(settings.max_conn_lifetime),
            idle_timeout: minutes(settings.max_conn_idle_time),
            ..PoolConfig::default()
        }
    }
}

//! Executor configuration.

use std::time::Duration;

use serde::Deserialize;

/// Deadlines applied by [`Db`](crate::Db) wrappers.
///
/// Deserializes from seconds: `{"default_timeout_secs": 10, "multi_step_timeout_secs": 20}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "DbSettings")]
pub struct DbConfig {
    /// Budget for a single statement, connection acquisition included.
    pub default_timeout: Duration,
    /// Budget for transactions and batches.
    pub multi_step_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            multi_step_timeout: Duration::from_secs(20),
        }
    }
}

impl DbConfig {
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn multi_step_timeout(mut self, timeout: Duration) -> Self {
        self.multi_step_timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct DbSettings {
    default_timeout_secs: u64,
    multi_step_timeout_secs: u64,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: 10,
            multi_step_timeout_secs: 20,
        }
    }
}

impl From<DbSettings> for DbConfig {
    fn from(settings: DbSettings) -> Self {
        Self {
            default_timeout: Duration::from_secs(settings.default_timeout_secs),
            multi_step_timeout: Duration::from_secs(settings.multi_step_timeout_secs),
        }
    }
}

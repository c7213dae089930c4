//! Per-call deadlines.
//!
//! [`with_deadline`] wraps any database future in the runtime's
//! [`timeout_at`](asupersync::time::timeout_at) and resolves it to
//! `Outcome::Err(Error::Timeout)` once the deadline passes. Deadlines are
//! absolute points on the runtime clock ([`wall_now`]), so one deadline can
//! bound several consecutive steps.
//!
//! # Example
//!
//! ```ignore
//! let deadline = Deadline::after(Duration::from_secs(10));
//! let rows = with_deadline(deadline, conn.query(&cx, sql, &params)).await;
//! ```

use std::future::Future;
use std::time::Duration;

use asupersync::time::{timeout_at, wall_now};
use asupersync::types::Time;

use crate::{Error, Outcome};

/// A point in time after which an operation must give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    at: Time,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: wall_now() + timeout,
        }
    }

    pub const fn at(at: Time) -> Self {
        Self { at }
    }

    pub fn time(&self) -> Time {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        Duration::from_nanos(self.at.duration_since(wall_now()))
    }

    pub fn is_expired(&self) -> bool {
        wall_now() >= self.at
    }

    /// The tighter of two deadlines.
    #[must_use]
    pub fn min(self, other: Deadline) -> Deadline {
        if other.at < self.at { other } else { self }
    }
}

/// Bound `fut` by `deadline`.
///
/// A future that completes in the same poll its deadline elapses keeps its
/// result.
pub async fn with_deadline<F, T>(deadline: Deadline, fut: F) -> Outcome<T, Error>
where
    F: Future<Output = Outcome<T, Error>>,
{
    match timeout_at(deadline.at, fut).await {
        Ok(out) => out,
        Err(_elapsed) => {
            tracing::debug!("deadline elapsed before operation completed");
            Outcome::Err(Error::Timeout)
        }
    }
}

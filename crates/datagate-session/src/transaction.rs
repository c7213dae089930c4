//! Unit-of-work orchestration.
//!
//! [`run_in_tx`] opens a transaction on one connection, hands the handle to a
//! closure, and then either commits (closure succeeded) or rolls back
//! (closure failed, was cancelled, or ran past its deadline):
//!
//! ```text
//! Idle -> Begin -> Running -> Commit   -> Closed
//!                          \-> Rollback -> Closed
//! ```
//!
//! Failure reporting:
//!
//! - closure error, rollback ok: the closure's error
//! - closure error, rollback error: `Error::Rollback { rollback, original }`
//! - closure ok, commit error: `Error::Commit(..)`
//!
//! The rollback runs under its own context, so a caller that was cancelled
//! still gets its ROLLBACK onto the wire; `rollback_budget` bounds it. A
//! rollback that cannot reach the server (the connection was abandoned
//! mid-exchange) leaves the connection non-reusable; the pool closes it, which
//! ends the transaction server-side.

use std::time::Duration;

use asupersync::{Cx, Outcome};
use datagate_core::{Connection, Deadline, Error, TransactionOps, TxOptions, with_deadline};

/// Run `f` inside a transaction on `conn`.
///
/// `deadline` bounds BEGIN, the closure and COMMIT together; the rollback gets
/// a fresh `rollback_budget` so a unit of work that timed out can still be
/// undone.
#[tracing::instrument(level = "debug", skip_all, fields(isolation = ?options.isolation, access = ?options.access))]
pub async fn run_in_tx<C, T, F>(
    cx: &Cx,
    conn: &C,
    options: TxOptions,
    deadline: Deadline,
    rollback_budget: Duration,
    f: F,
) -> Outcome<T, Error>
where
    C: Connection,
    F: AsyncFnOnce(&C::Tx) -> Outcome<T, Error>,
{
    let started = std::time::Instant::now();

    let tx = match with_deadline(deadline, conn.begin_with(cx, options)).await {
        Outcome::Ok(tx) => tx,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let result = with_deadline(deadline, f(&tx)).await;

    match result {
        Outcome::Ok(value) => match with_deadline(deadline, tx.commit(cx)).await {
            Outcome::Ok(()) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis(), "transaction committed");
                Outcome::Ok(value)
            }
            Outcome::Err(e) => {
                tracing::warn!(error = %e, "commit failed");
                Outcome::Err(Error::Commit(Box::new(e)))
            }
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        },
        Outcome::Err(original) => {
            tracing::debug!(error = %original, "unit of work failed, rolling back");
            match rollback(tx, rollback_budget).await {
                Ok(()) => Outcome::Err(original),
                Err(rollback_err) => Outcome::Err(Error::rollback_failed(rollback_err, original)),
            }
        }
        Outcome::Cancelled(reason) => {
            if let Err(e) = rollback(tx, rollback_budget).await {
                tracing::warn!(error = %e, "rollback after cancellation failed");
            }
            Outcome::Cancelled(reason)
        }
        Outcome::Panicked(payload) => {
            if let Err(e) = rollback(tx, rollback_budget).await {
                tracing::warn!(error = %e, "rollback after panic failed");
            }
            Outcome::Panicked(payload)
        }
    }
}

async fn rollback<X: TransactionOps>(tx: X, budget: Duration) -> Result<(), Error> {
    let cleanup = Cx::for_request();
    match with_deadline(Deadline::after(budget), tx.rollback(&cleanup)).await {
        Outcome::Ok(()) => Ok(()),
        Outcome::Err(e) => {
            tracing::warn!(error = %e, "rollback failed");
            Err(e)
        }
        Outcome::Cancelled(_) => Err(Error::query(
            datagate_core::QueryErrorKind::Cancelled,
            "rollback cancelled",
        )),
        Outcome::Panicked(_) => Err(Error::Custom("rollback panicked".to_string())),
    }
}

//! Multi-row inserts.
//!
//! [`bulk_insert`] writes a slice of one record type as multi-row `INSERT`s,
//! split so that no statement carries more than
//! [`MAX_PARAMS`](datagate_query::MAX_PARAMS) bind parameters. Applications
//! that insert several record types together describe them with their own
//! enum, one variant per type, and implement [`BulkPayload`] by delegating to
//! the slice impl:
//!
//! ```ignore
//! enum Payload {
//!     Bags(Vec<Bag>),
//!     Articles(Vec<Article>),
//! }
//!
//! impl BulkPayload for Payload {
//!     fn insert_statements(&self) -> Result<Vec<Statement>> {
//!         match self {
//!             Payload::Bags(rows) => rows.insert_statements(),
//!             Payload::Articles(rows) => rows.insert_statements(),
//!         }
//!     }
//! }
//!
//! let inserted = bulk_insert_all(&cx, &tx, &[Payload::Bags(bags), Payload::Articles(articles)]).await?;
//! ```
//!
//! All statements of one call go out as a single pipeline.

use asupersync::{Cx, Outcome};
use datagate_core::{Error, Executor, Record, Result, Statement};
use datagate_query::InsertMany;

/// Rows that can be written with multi-row `INSERT`s.
pub trait BulkPayload {
    /// The `INSERT`s for these rows in row order; empty when there is
    /// nothing to write.
    fn insert_statements(&self) -> Result<Vec<Statement>>;
}

impl<R: Record> BulkPayload for [R] {
    fn insert_statements(&self) -> Result<Vec<Statement>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        InsertMany::new(self).build_statements()
    }
}

impl<R: Record> BulkPayload for Vec<R> {
    fn insert_statements(&self) -> Result<Vec<Statement>> {
        self.as_slice().insert_statements()
    }
}

/// Insert `records` and return the inserted row count.
///
/// An empty slice is a no-op.
#[tracing::instrument(level = "debug", skip_all, fields(table = R::TABLE, rows = records.len()))]
pub async fn bulk_insert<R, E>(cx: &Cx, exec: &E, records: &[R]) -> Outcome<u64, Error>
where
    R: Record,
    E: Executor,
{
    match records.insert_statements() {
        Ok(statements) => run_inserts(cx, exec, &statements).await,
        Err(e) => Outcome::Err(e),
    }
}

/// Insert every payload in one round trip and return the total row count.
///
/// Run it on a transaction handle to make the payloads all-or-nothing.
#[tracing::instrument(level = "debug", skip_all, fields(payloads = payloads.len()))]
pub async fn bulk_insert_all<P, E>(cx: &Cx, exec: &E, payloads: &[P]) -> Outcome<u64, Error>
where
    P: BulkPayload,
    E: Executor,
{
    let mut statements = Vec::with_capacity(payloads.len());
    for payload in payloads {
        match payload.insert_statements() {
            Ok(built) => statements.extend(built),
            Err(e) => return Outcome::Err(e),
        }
    }
    run_inserts(cx, exec, &statements).await
}

async fn run_inserts<E: Executor>(cx: &Cx, exec: &E, statements: &[Statement]) -> Outcome<u64, Error> {
    match statements {
        [] => Outcome::Ok(0),
        [single] => exec.execute(cx, single.sql(), single.params()).await,
        _ => {
            tracing::debug!(statements = statements.len(), "bulk insert split across statements");
            exec.pipeline(cx, statements)
                .await
                .map(|results| results.iter().map(|r| r.rows_affected).sum())
        }
    }
}

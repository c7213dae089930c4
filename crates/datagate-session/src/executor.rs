//! Single- and multi-record executors.
//!
//! These run one [`Statement`] against anything that implements
//! [`Executor`]: a pooled connection, a transaction handle, or a test double.
//! Rows are materialized through [`FromRow`]; for `#[derive(Record)]` types
//! that is a lax, case-insensitive bind by column name, so extra columns in
//! the result are ignored.
//!
//! Zero rows is `Error::NotFound` for the single-record reads and an empty
//! `Vec` for [`select_rows`]. Every other failure is returned unchanged.

use asupersync::{Cx, Outcome};
use datagate_core::{Error, Executor, FromRow, Statement};

/// Run `stmt` and materialize exactly one row.
#[tracing::instrument(level = "debug", skip_all, fields(table = stmt.table()))]
pub async fn select_one<R, E>(cx: &Cx, exec: &E, stmt: &Statement) -> Outcome<R, Error>
where
    R: FromRow,
    E: Executor,
{
    match select_optional(cx, exec, stmt).await {
        Outcome::Ok(Some(record)) => Outcome::Ok(record),
        Outcome::Ok(None) => Outcome::Err(Error::NotFound),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Run `stmt` and materialize the first row, if there is one.
pub async fn select_optional<R, E>(cx: &Cx, exec: &E, stmt: &Statement) -> Outcome<Option<R>, Error>
where
    R: FromRow,
    E: Executor,
{
    let row = match exec.query_one(cx, stmt.sql(), stmt.params()).await {
        Outcome::Ok(row) => row,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    match row.as_ref().map(R::from_row).transpose() {
        Ok(record) => Outcome::Ok(record),
        Err(e) => Outcome::Err(e),
    }
}

/// Run `stmt` and write the single resulting row into `dest`.
///
/// `dest` is only written once the row has been fully materialized, so it is
/// left untouched on `NotFound` and on every failure.
pub async fn select_one_into<R, E>(
    cx: &Cx,
    exec: &E,
    stmt: &Statement,
    dest: &mut R,
) -> Outcome<(), Error>
where
    R: FromRow,
    E: Executor,
{
    select_one(cx, exec, stmt).await.map(|record| *dest = record)
}

/// Run `stmt` and materialize every row, in result order.
#[tracing::instrument(level = "debug", skip_all, fields(table = stmt.table()))]
pub async fn select_rows<R, E>(cx: &Cx, exec: &E, stmt: &Statement) -> Outcome<Vec<R>, Error>
where
    R: FromRow,
    E: Executor,
{
    let rows = match exec.query(cx, stmt.sql(), stmt.params()).await {
        Outcome::Ok(rows) => rows,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    tracing::debug!(rows = rows.len(), "materializing rows");
    match rows.iter().map(R::from_row).collect() {
        Ok(records) => Outcome::Ok(records),
        Err(e) => Outcome::Err(e),
    }
}

/// Run a statement without a result set and return the affected-row count.
#[tracing::instrument(level = "debug", skip_all, fields(table = stmt.table(), kind = ?stmt.kind()))]
pub async fn exec<E: Executor>(cx: &Cx, exec: &E, stmt: &Statement) -> Outcome<u64, Error> {
    exec.execute(cx, stmt.sql(), stmt.params()).await
}

/// Run a single-row write carrying `RETURNING` and materialize the row.
pub async fn insert_returning<R, E>(cx: &Cx, exec: &E, stmt: &Statement) -> Outcome<R, Error>
where
    R: FromRow,
    E: Executor,
{
    if !stmt.returning() {
        return Outcome::Err(Error::Custom(format!(
            "insert_returning needs a statement with RETURNING: {}",
            stmt.sql()
        )));
    }
    select_one(cx, exec, stmt).await
}

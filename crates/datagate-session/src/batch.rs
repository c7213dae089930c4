//! Batch pipeline.
//!
//! A [`Batch`] collects heterogeneous statements, each paired with what the
//! caller expects back and where to put it. [`Batch::send`] ships them in one
//! round trip through [`Executor::pipeline`] and then drains the results into
//! the destinations strictly in submission order.
//!
//! # Example
//!
//! ```ignore
//! let mut user = User::default();
//! let mut orders = Vec::new();
//!
//! let mut batch = Batch::new();
//! batch
//!     .queue_one(lookup_user, &mut user)
//!     .queue_exec(touch_last_seen)
//!     .queue_rows(recent_orders, &mut orders);
//! batch.send(&cx, &conn).await?;
//! ```

use asupersync::{Cx, Outcome};
use datagate_core::{Error, Executor, FromRow, Result, Statement, StatementResult};

/// What a queued statement must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// No result set; only the affected-row count matters.
    Exec,
    /// Exactly one row is materialized. Zero rows is `Error::NotFound`.
    ExactlyOne,
    /// Any number of rows, including none.
    ZeroOrMore,
}

type Sink<'d> = Box<dyn FnOnce(StatementResult) -> Result<()> + Send + 'd>;

struct Queued<'d> {
    statement: Statement,
    expect: Expect,
    sink: Option<Sink<'d>>,
}

/// Statements to run in one round trip, with their destinations.
///
/// Destinations are borrowed for `'d` and written only after the round trip
/// completes.
#[derive(Default)]
pub struct Batch<'d> {
    queued: Vec<Queued<'d>>,
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.queued.iter().map(|q| (q.expect, q.statement.sql())))
            .finish()
    }
}

impl<'d> Batch<'d> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Queue a statement whose result set, if any, is discarded.
    pub fn queue_exec(&mut self, statement: Statement) -> &mut Self {
        self.queued.push(Queued {
            statement,
            expect: Expect::Exec,
            sink: None,
        });
        self
    }

    /// Queue a statement that must return a row, written into `dest`.
    pub fn queue_one<R>(&mut self, statement: Statement, dest: &'d mut R) -> &mut Self
    where
        R: FromRow + Send,
    {
        self.push(statement, Expect::ExactlyOne, move |result| {
            if let Some(row) = result.rows.first() {
                *dest = R::from_row(row)?;
            }
            Ok(())
        })
    }

    /// Queue a statement whose first row, if any, is written into `dest`.
    pub fn queue_optional<R>(&mut self, statement: Statement, dest: &'d mut Option<R>) -> &mut Self
    where
        R: FromRow + Send,
    {
        self.push(statement, Expect::ZeroOrMore, move |result| {
            *dest = result.rows.first().map(R::from_row).transpose()?;
            Ok(())
        })
    }

    /// Queue a statement whose rows are appended to `dest`.
    pub fn queue_rows<R>(&mut self, statement: Statement, dest: &'d mut Vec<R>) -> &mut Self
    where
        R: FromRow + Send,
    {
        self.push(statement, Expect::ZeroOrMore, move |result| {
            let records = result
                .rows
                .iter()
                .map(R::from_row)
                .collect::<Result<Vec<R>>>()?;
            dest.extend(records);
            Ok(())
        })
    }

    fn push(
        &mut self,
        statement: Statement,
        expect: Expect,
        sink: impl FnOnce(StatementResult) -> Result<()> + Send + 'd,
    ) -> &mut Self {
        self.queued.push(Queued {
            statement,
            expect,
            sink: Some(Box::new(sink)),
        });
        self
    }

    /// Run every queued statement in one round trip and fill the destinations.
    ///
    /// The first failure, whether from the server or while materializing a
    /// result, stops extraction and is returned; destinations of later
    /// statements stay untouched. Nothing is rolled back unless the batch runs
    /// on a transaction handle whose unit of work then fails.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = self.queued.len()))]
    pub async fn send<E: Executor>(self, cx: &Cx, exec: &E) -> Outcome<(), Error> {
        if self.queued.is_empty() {
            return Outcome::Ok(());
        }

        let (statements, sinks): (Vec<Statement>, Vec<(Expect, Option<Sink<'d>>)>) = self
            .queued
            .into_iter()
            .map(|q| (q.statement, (q.expect, q.sink)))
            .unzip();

        let results = match exec.pipeline(cx, &statements).await {
            Outcome::Ok(results) => results,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if results.len() != statements.len() {
            return Outcome::Err(Error::protocol(format!(
                "batch of {} statements produced {} results",
                statements.len(),
                results.len()
            )));
        }

        for (index, (result, (expect, sink))) in results.into_iter().zip(sinks).enumerate() {
            if expect == Expect::ExactlyOne && result.rows.is_empty() {
                tracing::debug!(index, sql = statements[index].sql(), "batch statement returned no rows");
                return Outcome::Err(Error::NotFound);
            }
            if let Some(sink) = sink {
                if let Err(e) = sink(result) {
                    return Outcome::Err(e);
                }
            }
        }
        Outcome::Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{Row, Value};

    fn row(v: i64) -> Row {
        Row::new(vec!["v".to_string()], vec![Value::BigInt(v)])
    }

    #[test]
    fn test_queue_keeps_order_and_expectations() {
        let mut one = row(0);
        let mut many: Vec<Row> = Vec::new();
        let mut maybe: Option<Row> = None;
        let mut batch = Batch::new();
        batch
            .queue_one(Statement::raw("SELECT 1", vec![]), &mut one)
            .queue_exec(Statement::raw("UPDATE t SET x = 1 WHERE id = 1", vec![]))
            .queue_rows(Statement::raw("SELECT 2", vec![]), &mut many)
            .queue_optional(Statement::raw("SELECT 3", vec![]), &mut maybe);
        assert_eq!(batch.len(), 4);
        let expects: Vec<Expect> = batch.queued.iter().map(|q| q.expect).collect();
        assert_eq!(
            expects,
            vec![Expect::ExactlyOne, Expect::Exec, Expect::ZeroOrMore, Expect::ZeroOrMore]
        );
        assert!(batch.queued[1].sink.is_none());
    }

    #[test]
    fn test_sinks_write_destinations() {
        let mut one = row(0);
        let mut many = vec![row(1)];
        {
            let mut batch = Batch::new();
            batch
                .queue_one(Statement::raw("SELECT", vec![]), &mut one)
                .queue_rows(Statement::raw("SELECT", vec![]), &mut many);
            let mut sinks = batch.queued.into_iter().filter_map(|q| q.sink);
            let first = sinks.next().unwrap();
            first(StatementResult {
                rows: vec![row(5)],
                rows_affected: 1,
            })
            .unwrap();
            let second = sinks.next().unwrap();
            second(StatementResult {
                rows: vec![row(2), row(3)],
                rows_affected: 2,
            })
            .unwrap();
        }
        assert_eq!(one.get_named("v"), Some(&Value::BigInt(5)));
        assert_eq!(many.len(), 3);
    }
}

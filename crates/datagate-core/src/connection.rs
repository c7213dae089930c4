//! Database connection contracts.
//!
//! Drivers implement [`Connection`] and its transaction type [`TransactionOps`].
//! Both extend [`Executor`], so every statement helper works the same way inside
//! and outside a transaction.

use std::future::Future;

use crate::error::Result;
use crate::row::Row;
use crate::statement::Statement;
use crate::value::Value;
use crate::{Cx, Error, Outcome};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub const fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub const fn as_sql(self) -> &'static str {
        match self {
            AccessMode::ReadWrite => "READ WRITE",
            AccessMode::ReadOnly => "READ ONLY",
        }
    }
}

/// Options for opening a transaction.
///
/// Defaults to read-committed, read-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub access: AccessMode,
}

impl TxOptions {
    pub const fn new(isolation: IsolationLevel) -> Self {
        Self {
            isolation,
            access: AccessMode::ReadWrite,
        }
    }

    /// Read-committed, read-only.
    pub const fn read_only() -> Self {
        Self {
            isolation: IsolationLevel::ReadCommitted,
            access: AccessMode::ReadOnly,
        }
    }

    #[must_use]
    pub const fn access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// The statement that opens a transaction with these options.
    pub fn begin_sql(&self) -> String {
        format!(
            "BEGIN ISOLATION LEVEL {} {}",
            self.isolation.as_sql(),
            self.access.as_sql()
        )
    }
}

/// Outcome of one statement in a pipelined round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementResult {
    /// Rows produced (empty for statements without a result set).
    pub rows: Vec<Row>,
    /// Rows affected according to the command tag.
    pub rows_affected: u64,
}

/// Statement execution, shared by connections and transactions.
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let fut = self.query(cx, sql, params);
        async move { fut.await.map(|rows| rows.into_iter().next()) }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Run several statements as one round trip, results in submission order.
    ///
    /// The default runs them one after another; drivers that can pipeline
    /// override it. Execution stops at the first failure.
    fn pipeline(
        &self,
        cx: &Cx,
        statements: &[Statement],
    ) -> impl Future<Output = Outcome<Vec<StatementResult>, Error>> + Send {
        async move {
            let mut results = Vec::with_capacity(statements.len());
            for stmt in statements {
                if stmt.yields_rows() {
                    match self.query(cx, stmt.sql(), stmt.params()).await {
                        Outcome::Ok(rows) => results.push(StatementResult {
                            rows_affected: rows.len() as u64,
                            rows,
                        }),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                } else {
                    match self.execute(cx, stmt.sql(), stmt.params()).await {
                        Outcome::Ok(n) => results.push(StatementResult {
                            rows: Vec::new(),
                            rows_affected: n,
                        }),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    }
                }
            }
            Outcome::Ok(results)
        }
    }
}

/// A database connection.
pub trait Connection: Executor {
    /// Transaction handle type. It owns what it needs from the connection so
    /// it can be handed to a unit-of-work closure.
    type Tx: TransactionOps;

    /// Begin a transaction with the given options.
    fn begin_with(
        &self,
        cx: &Cx,
        options: TxOptions,
    ) -> impl Future<Output = Outcome<Self::Tx, Error>> + Send;

    /// Begin a read-committed, read-write transaction.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx, Error>> + Send {
        self.begin_with(cx, TxOptions::default())
    }

    /// Check that the connection is alive.
    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Whether the connection can be handed to another caller.
    ///
    /// Drivers return `false` after an exchange was abandoned halfway (deadline,
    /// cancellation) or the link failed; the pool then discards the connection.
    fn is_reusable(&self) -> bool {
        true
    }

    /// Close the connection gracefully.
    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// Operations available on an open transaction.
pub trait TransactionOps: Executor {
    /// Create a savepoint.
    fn savepoint(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back to a savepoint.
    fn rollback_to(&self, cx: &Cx, name: &str)
    -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Release a savepoint.
    fn release(&self, cx: &Cx, name: &str) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit the transaction.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the transaction.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// Validate a savepoint name before it is interpolated into SQL.
pub fn validate_savepoint_name(name: &str) -> Result<()> {
    use crate::error::QueryErrorKind;

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::query(
            QueryErrorKind::Syntax,
            "Savepoint name cannot be empty",
        ));
    };
    if name.len() > 63 {
        return Err(Error::query(
            QueryErrorKind::Syntax,
            "Savepoint name exceeds maximum length of 63 characters",
        ));
    }
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::query(
            QueryErrorKind::Syntax,
            "Savepoint name must start with a letter or underscore",
        ));
    }
    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::query(
            QueryErrorKind::Syntax,
            format!("Savepoint name contains invalid character: '{c}'"),
        ));
    }
    Ok(())
}

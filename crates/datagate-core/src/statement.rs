//! Built statements.
//!
//! A [`Statement`] is the only thing the executors consume: SQL text with
//! positional `$n` parameters plus enough metadata to log and validate it.
//! Anything that can produce one implements [`BuildStatement`].

use crate::error::Result;
use crate::value::Value;

/// What a statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Hand-written SQL
    Raw,
}

impl StatementKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Raw => "raw",
        }
    }

    /// Whether the statement modifies data.
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

/// An immutable, parameterized statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    table: Option<String>,
    sql: String,
    params: Vec<Value>,
    returning: bool,
}

impl Statement {
    /// Wrap hand-written SQL.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            kind: StatementKind::Raw,
            table: None,
            sql: sql.into(),
            params,
            returning: false,
        }
    }

    /// Used by builders, which know the intent and target relation.
    pub fn new(
        kind: StatementKind,
        table: impl Into<String>,
        sql: impl Into<String>,
        params: Vec<Value>,
        returning: bool,
    ) -> Self {
        Self {
            kind,
            table: Some(table.into()),
            sql: sql.into(),
            params,
            returning,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Whether a write statement returns the affected rows.
    pub fn returning(&self) -> bool {
        self.returning
    }

    /// Whether executing this statement yields a result set.
    pub fn yields_rows(&self) -> bool {
        match self.kind {
            StatementKind::Select | StatementKind::Raw => true,
            _ => self.returning,
        }
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// The capability the engine requires from a statement builder.
pub trait BuildStatement {
    /// Produce the statement, or fail if the builder state is incomplete.
    fn build_statement(&self) -> Result<Statement>;
}

impl BuildStatement for Statement {
    fn build_statement(&self) -> Result<Statement> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_statement_yields_rows() {
        let stmt = Statement::raw("SELECT 1", vec![]);
        assert_eq!(stmt.kind(), StatementKind::Raw);
        assert!(stmt.yields_rows());
        assert!(stmt.table().is_none());
    }

    #[test]
    fn test_write_without_returning_yields_nothing() {
        let stmt = Statement::new(
            StatementKind::Update,
            "users",
            "UPDATE users SET name = $1",
            vec![Value::from("x")],
            false,
        );
        assert!(!stmt.yields_rows());
        assert!(stmt.kind().is_write());
        let (sql, params) = stmt.into_parts();
        assert_eq!(sql, "UPDATE users SET name = $1");
        assert_eq!(params.len(), 1);
    }
}

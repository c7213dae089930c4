//! Error types for datagate operations.
//!
//! Internal components never interpret SQLSTATE codes; they carry them upward
//! inside [`QueryError`] so the boundary classifier can map them. A query error
//! with a state code renders as `"<message> (SQLSTATE <code>)"`.

use std::fmt;

/// The primary error type for all datagate operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, authentication, disconnect)
    Connection(ConnectionError),
    /// Statement execution errors reported by the backend
    Query(QueryError),
    /// Wire protocol errors
    Protocol(ProtocolError),
    /// Connection pool errors
    Pool(PoolError),
    /// Record/row mapping errors (unsupported field, type mismatch)
    Mapping(String),
    /// A single-record read matched zero rows
    NotFound,
    /// The operation's deadline elapsed
    Timeout,
    /// The unit of work succeeded but COMMIT failed
    Commit(Box<Error>),
    /// The unit of work failed and so did the ROLLBACK
    Rollback {
        rollback: Box<Error>,
        original: Box<Error>,
    },
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Server refused the connection
    Refused,
    /// Authentication failed
    Authentication,
    /// Connection lost during operation
    Disconnected,
    /// SSL/TLS negotiation failed
    Ssl,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    pub sqlstate: Option<String>,
    pub sql: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// SQL syntax or access rule error
    Syntax,
    /// Integrity constraint violation
    Constraint,
    /// Serialization failure
    Serialization,
    /// Deadlock detected
    Deadlock,
    /// Statement cancelled by the server
    Cancelled,
    /// Statement timed out on the server
    Timeout,
    /// Transaction in an invalid state for the request
    TransactionState,
    /// A statement expected to return exactly one row returned several
    Cardinality,
    /// Any other database error
    Database,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// No connection became free before the acquire timeout
    Exhausted,
    /// The pool has been closed
    Closed,
    /// Invalid pool configuration
    Config,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a query error that carries no server diagnostics.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            message: message.into(),
            sqlstate: None,
            sql: None,
            detail: None,
            hint: None,
            position: None,
        })
    }

    /// Build a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: None,
        })
    }

    /// Build a connection error without an underlying source.
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    pub fn pool(kind: PoolErrorKind, message: impl Into<String>) -> Self {
        Error::Pool(PoolError {
            kind,
            message: message.into(),
        })
    }

    /// Combine a failed rollback with the unit-of-work error that caused it.
    pub fn rollback_failed(rollback: Error, original: Error) -> Self {
        Error::Rollback {
            rollback: Box::new(rollback),
            original: Box::new(original),
        }
    }

    /// The error that should drive classification.
    ///
    /// For a failed rollback this is the original unit-of-work error, unless the
    /// rollback reports that the transaction or connection was already in an
    /// unexpected state.
    pub fn primary(&self) -> &Error {
        match self {
            Error::Rollback { rollback, original } => {
                if rollback.is_unexpected_state() {
                    rollback.primary()
                } else {
                    original.primary()
                }
            }
            other => other,
        }
    }

    /// SQLSTATE code carried by this error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            Error::Commit(inner) => inner.sqlstate(),
            Error::Rollback { .. } => match self.primary() {
                Error::Query(q) => q.sqlstate.as_deref(),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.primary(), Error::NotFound)
    }

    pub fn is_timeout(&self) -> bool {
        match self.primary() {
            Error::Timeout => true,
            Error::Query(q) => q.kind == QueryErrorKind::Timeout,
            _ => false,
        }
    }

    /// Whether the error means the transaction or connection can no longer be
    /// used as expected (closed transaction, aborted transaction, lost link).
    pub fn is_unexpected_state(&self) -> bool {
        match self {
            Error::Query(q) => {
                q.kind == QueryErrorKind::TransactionState
                    || q.sqlstate.as_deref().is_some_and(|s| s.starts_with("25") || s.starts_with("2D"))
            }
            Error::Connection(c) => c.kind == ConnectionErrorKind::Disconnected,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "connection error: {}", e.message),
            Error::Query(e) => write!(f, "{e}"),
            Error::Protocol(e) => write!(f, "protocol error: {}", e.message),
            Error::Pool(e) => write!(f, "pool error: {}", e.message),
            Error::Mapping(msg) => write!(f, "mapping error: {msg}"),
            Error::NotFound => write!(f, "no rows in result set"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::Commit(inner) => write!(f, "commit tx: {inner}"),
            Error::Rollback { rollback, original } => {
                write!(f, "rollback tx: {rollback} (original: {original})")
            }
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sqlstate {
            Some(code) => write!(f, "{} (SQLSTATE {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Commit(inner) => Some(inner.as_ref()),
            Error::Rollback { original, .. } => Some(original.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

//! Core types and traits for datagate.
//!
//! `datagate-core` is the **contract layer** of the workspace. Every other crate
//! builds on the types defined here.
//!
//! # Role In The Architecture
//!
//! - **Contracts**: `Record` is implemented by domain types (usually through
//!   `#[derive(Record)]`), `Connection`/`TransactionOps` are implemented by drivers.
//! - **Data model**: `Value`, `Row` and `Statement` carry statement inputs and
//!   result sets between the builder, the executors and the driver.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   every database operation is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `datagate-macros` generates `Record` and `FromRow` implementations.
//! - `datagate-query` produces `Statement`s.
//! - `datagate-pool` hands out `Connection`s.
//! - `datagate-session` runs statements, transactions and batches through `Executor`.
//! - `datagate-postgres` implements `Connection` over the wire protocol.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Budget, Cx, Outcome, RegionId, TaskId};

pub mod connection;
pub mod deadline;
pub mod error;
pub mod record;
pub mod row;
pub mod statement;
pub mod validate;
pub mod value;

pub use connection::{
    AccessMode, Connection, Executor, IsolationLevel, StatementResult, TransactionOps, TxOptions,
};
pub use deadline::{Deadline, with_deadline};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, PoolError, PoolErrorKind, ProtocolError,
    QueryError, QueryErrorKind, Result,
};
pub use record::{
    FieldSpec, FromRow, Record, WriteMap, bind_lax, is_excluded, select_columns, write_map,
};
pub use row::{ColumnInfo, Row};
pub use statement::{BuildStatement, Statement, StatementKind};
pub use value::{FromValue, Value};

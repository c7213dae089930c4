//! datagate: tag-driven data access for PostgreSQL.
//!
//! Records describe their columns with `#[derive(Record)]`; statements are
//! built from those tables, executed through a pooled connection under a
//! deadline, and failures are classified into response bodies at the
//! boundary.
//!
//! | Crate | Role |
//! |---|---|
//! | `datagate-core` | records, values, rows, errors, connection contracts |
//! | `datagate-macros` | `#[derive(Record)]` |
//! | `datagate-query` | statement builders and pagination |
//! | `datagate-pool` | connection pool |
//! | `datagate-postgres` | wire-protocol driver |
//! | `datagate-session` | executors, transactions, batches, bulk inserts |
//! | `datagate-classify` | validation and error classification |
//!
//! # Example
//!
//! ```ignore
//! use datagate::prelude::*;
//!
//! #[derive(Debug, Default, Record)]
//! #[record(table = "users")]
//! struct User {
//!     #[record(select = "id")]
//!     id: i64,
//!     #[record(select = "email", write = "email", validate = "required,email")]
//!     email: String,
//! }
//!
//! let settings = DatabaseSettings::from_json(&text)?;
//! let db = datagate::connect(&cx, &settings).await?;
//!
//! if let Some(report) = validator.report(&user)? {
//!     return respond(report.classification());
//! }
//! let stmt = Insert::new(&user).returning().build_statement()?;
//! let created: User = db.insert_returning(&cx, &stmt).await?;
//! ```

pub mod connector;
pub mod settings;

pub use connector::{PgConnector, PgDb, connect, open};
pub use settings::DatabaseSettings;

pub use datagate_classify as classify;
pub use datagate_core as core;
pub use datagate_pool as pool;
pub use datagate_postgres as postgres;
pub use datagate_query as query;
pub use datagate_session as session;

pub use datagate_macros::Record;

/// Everything a typical handler needs.
pub mod prelude {
    pub use asupersync::{Cx, Outcome};

    pub use datagate_core::{
        AccessMode, BuildStatement, Connection, Error, Executor, FromRow, IsolationLevel, Record,
        Result, Row, Statement, TransactionOps, TxOptions, Value,
    };
    pub use datagate_macros::Record;

    pub use datagate_query::{Delete, Expr, Insert, InsertMany, Order, Page, Select, Update};

    pub use datagate_pool::{PoolConfig, PoolSettings, PoolStats};
    pub use datagate_postgres::{PgConfig, SslMode};

    pub use datagate_session::{
        Batch, BulkPayload, Db, DbConfig, Expect, bulk_insert, bulk_insert_all, exec,
        insert_returning, run_in_tx, select_one, select_one_into, select_optional, select_rows,
    };

    pub use datagate_classify::{
        Classification, DbErrorClassifier, ErrorKind, ErrorResponse, ErrorTable, RuleRegistry,
        SuccessResponse, ValidationReport, Validator, decode_json,
    };

    pub use crate::{DatabaseSettings, PgConnector, PgDb};
}

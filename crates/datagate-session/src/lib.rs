//! Statement execution for datagate.
//!
//! This crate runs [`Statement`](datagate_core::Statement)s the same way for
//! every record type:
//!
//! - **Executors** ([`executor`]): single-record reads (`NotFound` on zero
//!   rows, destination untouched on failure), multi-record reads, writes and
//!   `RETURNING` inserts.
//! - **Transactions** ([`transaction`]): a unit of work on one connection,
//!   committed on success and rolled back on failure, cancellation or deadline.
//! - **Batches** ([`batch`]): several statements in one round trip, results
//!   bound to destinations in submission order.
//! - **Bulk inserts** ([`bulk`]): one multi-row `INSERT` per record type.
//!
//! The free functions work on any [`Executor`](datagate_core::Executor), so
//! the same code runs on a pooled connection or inside a transaction. [`Db`]
//! wraps them with connection acquisition and per-call deadlines.
//!
//! # Example
//!
//! ```ignore
//! let db = Db::new(pool, connector, DbConfig::default());
//!
//! let user: User = db.select_one(&cx, &lookup).await?;
//!
//! db.write_tx(&cx, async |tx| {
//!     exec(&cx, tx, &debit).await?;
//!     exec(&cx, tx, &credit).await
//! })
//! .await?;
//! ```

pub mod batch;
pub mod bulk;
pub mod config;
pub mod db;
pub mod executor;
pub mod transaction;

pub use batch::{Batch, Expect};
pub use bulk::{BulkPayload, bulk_insert, bulk_insert_all};
pub use config::DbConfig;
pub use db::{Connector, Db, TxOf};
pub use executor::{exec, insert_returning, select_one, select_one_into, select_optional, select_rows};
pub use transaction::run_in_tx;

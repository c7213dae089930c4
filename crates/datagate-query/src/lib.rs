//! Statement builders for datagate.
//!
//! `datagate-query` is the default implementation of the statement-building
//! capability the executors consume. It turns an intent (select, insert,
//! update, delete) plus a record type's field table into an immutable
//! [`Statement`](datagate_core::Statement) with `$n` placeholders.
//!
//! Nothing in the engine depends on this crate: any type implementing
//! [`BuildStatement`](datagate_core::BuildStatement) can stand in, and
//! `Statement::raw` covers hand-written SQL.
//!
//! # Example
//!
//! ```ignore
//! use datagate_query::{Expr, Insert, Select};
//!
//! let insert = Insert::new(&user).returning().build_statement()?;
//! let lookup = Select::<User>::new()
//!     .filter(Expr::col("email").eq(&user.email))
//!     .build_statement()?;
//! ```

pub mod builder;
pub mod expr;
pub mod page;

pub use builder::{Delete, Insert, InsertMany, MAX_PARAMS, OnConflict, Order, Select, Update};
pub use expr::{BinaryOp, Column, Expr};
pub use page::Page;

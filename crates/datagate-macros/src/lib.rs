//! Procedural macros for datagate.
//!
//! `#[derive(Record)]` turns per-field `#[record(...)]` tags into a static
//! `FieldSpec` table plus typed accessors, so the attribute projector never
//! needs runtime reflection.
//!
//! ```ignore
//! #[derive(Debug, Default, Record)]
//! #[record(table = "users")]
//! struct User {
//!     #[record(select = "id")]
//!     id: i64,
//!     #[record(select, write, validate = "required,email", user_code = "E1")]
//!     email: String,
//!     #[record(select = "role", write = "-")]
//!     role: String,
//! }
//! ```
//!
//! Struct attribute:
//! - `table = "name"`: default relation (defaults to the snake_case struct name)
//!
//! Field attributes:
//! - `select` / `select = "col"`: read column (`"-"` excludes)
//! - `write` / `write = "col"`: write column (`"-"` excludes); `insert` is an alias
//! - `validate = "rules"`: comma-separated validation rules
//! - `user_code = "X1"`: suffix appended to this field's validation codes
//!
//! Every tagged field type must convert into `Value` and implement
//! `FromValue`; anything else is rejected at compile time. The derived
//! `FromRow` binds through `bind_lax`, so the struct must implement `Default`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod record_derive;

/// Derive `Record` and `FromRow` from `#[record(...)]` field tags.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match record_derive::parse_record(&input) {
        Ok(def) => record_derive::generate_record_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

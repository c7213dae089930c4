//! Boundary classification for datagate.
//!
//! Turns failures into the response a caller sends back:
//!
//! - [`Validator`] checks records against their `validate` rules before any
//!   statement is built and reports one message/code pair per failing field.
//! - [`DbErrorClassifier`] maps data-layer failures to a class, a message and
//!   an HTTP status through the PostgreSQL state-code table.
//! - [`decode_json`] rejects request bodies that do not decode.
//!
//! Registry and table are plain values: build them once at startup and share
//! them by reference or `Arc`.
//!
//! ```ignore
//! let validator = Validator::new(Arc::new(RuleRegistry::standard()));
//! let classifier = DbErrorClassifier::new(ErrorTable::standard());
//!
//! if let Some(report) = validator.report(&user)? {
//!     return respond(report.classification());
//! }
//! match db.insert_returning::<User>(&cx, &stmt).await {
//!     Outcome::Ok(user) => respond_ok(SuccessResponse::new(user)),
//!     Outcome::Err(e) => respond(classifier.classify_error(&e)),
//!     Outcome::Cancelled(_) => respond(classifier.cancelled()),
//!     Outcome::Panicked(p) => std::panic::resume_unwind(p.into_any()),
//! }
//! ```

pub mod db_error;
pub mod decode;
pub mod registry;
pub mod response;
pub mod taxonomy;
pub mod validator;

pub use db_error::{DbErrorClassifier, ErrorTable, TableEntry};
pub use decode::{classify_decode_error, decode_json};
pub use registry::RuleRegistry;
pub use response::{Classification, ErrorResponse, SUCCESS_MESSAGE, SuccessResponse};
pub use taxonomy::ErrorKind;
pub use validator::{CustomRule, ValidationReport, Validator, ValidatorError, Violation};

//! PostgreSQL frontend/backend protocol, version 3.0.
//!
//! Every message after startup is a type byte followed by a big-endian `i32`
//! length that counts itself but not the type byte:
//!
//! ```text
//! +------+--------+------------------+
//! | Type | Length | Payload          |
//! | 1B   | 4B     | (Length-4) bytes |
//! +------+--------+------------------+
//! ```
//!
//! The startup and SSL request messages omit the type byte.

mod messages;
mod reader;
mod writer;

pub use messages::*;
pub use reader::{DecodeError, MessageReader};
pub use writer::{EncodeError, MessageWriter, startup};

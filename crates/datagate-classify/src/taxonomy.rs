//! Boundary error taxonomy.
//!
//! Every failure that reaches a caller is reported as one [`ErrorKind`] plus
//! an HTTP status. The kind is what callers branch on; the status is what goes
//! on the wire.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Client input violates a declared rule
    ValidationFailure,
    /// A single-record read matched zero rows
    NotFound,
    /// Unique violation or another conflicting state
    Conflict,
    /// Other integrity or data violations
    ConstraintViolation,
    /// The backend refused the request (bad syntax, authorization, limits)
    Rejected,
    /// Pool exhaustion, deadline exceeded, backend out of resources
    ResourceExhausted,
    /// Connection loss or cancellation
    ConnectionFailure,
    /// Malformed statement or programming error
    SyntaxOrInternal,
    /// No usable state code
    Unclassified,
}

impl ErrorKind {
    /// Status used when nothing more specific is known.
    pub const fn default_status(self) -> u16 {
        match self {
            ErrorKind::ValidationFailure | ErrorKind::Rejected => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::ConstraintViolation => 422,
            ErrorKind::ResourceExhausted | ErrorKind::ConnectionFailure => 503,
            ErrorKind::SyntaxOrInternal | ErrorKind::Unclassified => 500,
        }
    }

    /// Kind implied by a status from the state-code table.
    pub const fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::ConstraintViolation,
            400..=403 => ErrorKind::Rejected,
            499 => ErrorKind::ConnectionFailure,
            503 => ErrorKind::ResourceExhausted,
            _ => ErrorKind::SyntaxOrInternal,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::Rejected => "rejected",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::ConnectionFailure => "connection_failure",
            ErrorKind::SyntaxOrInternal => "syntax_or_internal",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_families() {
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::ConstraintViolation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Rejected);
        assert_eq!(ErrorKind::from_status(499), ErrorKind::ConnectionFailure);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ResourceExhausted);
        assert_eq!(ErrorKind::from_status(501), ErrorKind::SyntaxOrInternal);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::SyntaxOrInternal);
    }

    #[test]
    fn test_default_status() {
        assert_eq!(ErrorKind::ValidationFailure.default_status(), 400);
        assert_eq!(ErrorKind::NotFound.default_status(), 404);
        assert_eq!(ErrorKind::Unclassified.default_status(), 500);
        assert_eq!(ErrorKind::ConnectionFailure.to_string(), "connection_failure");
    }
}

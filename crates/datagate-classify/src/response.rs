//! Response bodies produced at the boundary.
//!
//! ```json
//! {"success": false, "message": ["email is a required field"], "errorno": ["O11"]}
//! {"success": true, "message": "Success", "data": {"id": 7}}
//! ```
//!
//! `message` and `errorno` of an error body are aligned by index: one entry
//! per violation or failure.

use serde::{Deserialize, Serialize};

use crate::taxonomy::ErrorKind;

/// Message carried by every success body.
pub const SUCCESS_MESSAGE: &str = "Success";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: Vec<String>,
    pub errorno: Vec<String>,
}

impl ErrorResponse {
    pub fn new(message: Vec<String>, errorno: Vec<String>) -> Self {
        Self {
            success: false,
            message,
            errorno,
        }
    }

    /// Body with a single message/code pair.
    pub fn single(message: impl Into<String>, errorno: impl Into<String>) -> Self {
        Self::new(vec![message.into()], vec![errorno.into()])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            data,
        }
    }
}

/// A classified failure: what kind it is, the status to answer with, and the
/// body to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ErrorKind,
    pub status: u16,
    pub body: ErrorResponse,
}

impl Classification {
    pub fn new(kind: ErrorKind, status: u16, body: ErrorResponse) -> Self {
        Self { kind, status, body }
    }

    /// First code of the body, the one callers usually log.
    pub fn code(&self) -> Option<&str> {
        self.body.errorno.first().map(String::as_str)
    }

    /// First message of the body.
    pub fn message(&self) -> Option<&str> {
        self.body.message.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_shape() {
        let body = ErrorResponse::new(
            vec!["email is a required field".into(), "name must be at least 5 characters in length".into()],
            vec!["O11".into(), "O9N1".into()],
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "success": false,
                "message": ["email is a required field", "name must be at least 5 characters in length"],
                "errorno": ["O11", "O9N1"],
            })
        );
    }

    #[test]
    fn test_success_body_shape() {
        let body = SuccessResponse::new(json!({"id": 7}));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"success": true, "message": "Success", "data": {"id": 7}})
        );
    }

    #[test]
    fn test_classification_accessors() {
        let c = Classification::new(
            ErrorKind::Conflict,
            409,
            ErrorResponse::single("Integrity Constraint Violation", "23"),
        );
        assert_eq!(c.code(), Some("23"));
        assert_eq!(c.message(), Some("Integrity Constraint Violation"));
    }
}

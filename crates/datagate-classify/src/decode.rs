//! Request body decoding errors.
//!
//! A body that does not decode is answered with 422 and code `UP1`:
//!
//! - a value of the wrong type: `"Send <type> for field: <field>"`
//! - broken JSON: `"Malformed json request"`
//! - anything else: the decoder's own message

use datagate_core::validate::first_capture;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::response::{Classification, ErrorResponse};
use crate::taxonomy::ErrorKind;

pub const DECODE_CODE: &str = "UP1";
pub const DECODE_STATUS: u16 = 422;
pub const MALFORMED_MESSAGE: &str = "Malformed json request";

const EXPECTED_PATTERN: &str = r"^invalid (?:type|value): .*, expected (.+) at line \d+ column \d+$";

/// Key whose value ends the text, e.g. `{"id": 1, "age": "ten"` gives `age`.
const TRAILING_KEY_PATTERN: &str =
    r#""((?:[^"\\]|\\.)+)"\s*:\s*(?:"(?:[^"\\]|\\.)*"?|[^,:{}\[\]"]*|[{\[])\s*$"#;

/// Decode `body`, classifying a failure.
pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, Classification> {
    serde_json::from_str(body).map_err(|e| classify_decode_error(&e, body))
}

/// Classify a decode failure of `body`.
pub fn classify_decode_error(err: &serde_json::Error, body: &str) -> Classification {
    let message = match err.classify() {
        Category::Syntax | Category::Eof => MALFORMED_MESSAGE.to_string(),
        Category::Data => type_mismatch(err, body).unwrap_or_else(|| err.to_string()),
        Category::Io => err.to_string(),
    };
    tracing::debug!(error = %err, "request body rejected");
    Classification::new(
        ErrorKind::ValidationFailure,
        DECODE_STATUS,
        ErrorResponse::single(message, DECODE_CODE),
    )
}

fn type_mismatch(err: &serde_json::Error, body: &str) -> Option<String> {
    let rendered = err.to_string();
    let expected = first_capture(&rendered, EXPECTED_PATTERN)?;
    let prefix = body.get(..error_offset(body, err.line(), err.column()))?;
    let field = first_capture(prefix, TRAILING_KEY_PATTERN)?;
    Some(format!("Send {expected} for field: {field}"))
}

/// Byte offset of a 1-based line/column position, clamped to the body.
fn error_offset(body: &str, line: usize, column: usize) -> usize {
    let line_start: usize = body
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let mut offset = (line_start + column).min(body.len());
    while !body.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Signup {
        email: String,
        age: i64,
    }

    fn reject(body: &str) -> Classification {
        match decode_json::<Signup>(body) {
            Ok(v) => panic!("decoded {v:?}"),
            Err(c) => c,
        }
    }

    #[test]
    fn test_wrong_type_names_the_field() {
        let c = reject(r#"{"email": "a@example.com", "age": "ten"}"#);
        assert_eq!(c.status, 422);
        assert_eq!(c.body.errorno, vec!["UP1"]);
        assert_eq!(c.body.message, vec!["Send i64 for field: age"]);
    }

    #[test]
    fn test_wrong_type_across_lines() {
        let body = "{\n  \"email\": 42,\n  \"age\": 3\n}";
        let c = reject(body);
        assert_eq!(c.body.message, vec!["Send a string for field: email"]);
    }

    #[test]
    fn test_malformed() {
        let c = reject(r#"{"email": "a@example.com", "age": }"#);
        assert_eq!(c.body.message, vec![MALFORMED_MESSAGE]);
        let c = reject(r#"{"email": "a@exa"#);
        assert_eq!(c.body.message, vec![MALFORMED_MESSAGE]);
    }

    #[test]
    fn test_other_data_errors_keep_decoder_text() {
        let c = reject(r#"{"email": "a@example.com"}"#);
        assert!(c.body.message[0].starts_with("missing field `age`"));
        assert_eq!(c.kind, ErrorKind::ValidationFailure);
    }

    #[test]
    fn test_error_offset_clamps() {
        assert_eq!(error_offset("abc", 1, 10), 3);
        assert_eq!(error_offset("ab\ncd", 2, 1), 4);
        assert_eq!(error_offset("é", 1, 1), 0);
    }
}

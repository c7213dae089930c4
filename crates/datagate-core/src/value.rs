//! Dynamic SQL values.
//!
//! `Value` is the currency between records, statements and result rows. The
//! Postgres driver exchanges values in text format, so date and time columns
//! travel as ISO-8601 text.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A dynamically-typed SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 16-bit integer
    SmallInt(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    BigInt(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Arbitrary precision numeric, kept as its decimal text
    Decimal(String),
    /// Text (also carries date/time values in ISO-8601 form)
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// UUID
    Uuid([u8; 16]),
    /// JSON / JSONB document
    Json(serde_json::Value),
    /// One-dimensional array
    Array(Vec<Value>),
}

impl Value {
    /// Whether this value is SQL NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is the "zero value" of its type.
    ///
    /// NULL, `false`, `0`, the empty string, empty bytes and the empty array all
    /// count as zero. The `required` validation rule rejects zero values.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !*b,
            Value::SmallInt(v) => *v == 0,
            Value::Int(v) => *v == 0,
            Value::BigInt(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Double(v) => *v == 0.0,
            Value::Decimal(s) | Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Uuid(u) => u.iter().all(|b| *b == 0),
            Value::Json(j) => j.is_null(),
            Value::Array(a) => a.is_empty(),
        }
    }

    /// Name of the variant, used in mapping error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::SmallInt(_) => "smallint",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
        }
    }

    /// Get as i64 if this is any integer type.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as f64 if this is any numeric type.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Decimal(s) => s.parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Borrow as a string slice if this is text-like.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Length used by the `min`/`max`/`len` rules on non-numeric values.
    ///
    /// Text is measured in characters, not bytes.
    pub fn char_len(&self) -> Option<usize> {
        match self {
            Value::Text(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::Array(a) => Some(a.len()),
            _ => None,
        }
    }

    /// Render the value the way it would appear in a text-format protocol
    /// message. `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
            Value::SmallInt(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::BigInt(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Decimal(s) | Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => {
                let mut out = String::with_capacity(2 + b.len() * 2);
                out.push_str("\\x");
                for byte in b {
                    out.push_str(&format!("{byte:02x}"));
                }
                Some(out)
            }
            Value::Uuid(u) => Some(format_uuid(u)),
            Value::Json(j) => Some(j.to_string()),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v.to_text() {
                        None => "NULL".to_string(),
                        Some(t) => format!("\"{}\"", t.replace('\\', "\\\\").replace('"', "\\\"")),
                    })
                    .collect();
                Some(format!("{{{}}}", parts.join(",")))
            }
        }
    }
}

/// Format 16 bytes as a hyphenated lowercase UUID.
pub fn format_uuid(bytes: &[u8; 16]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Parse a hyphenated (or bare) UUID string.
pub fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(out)
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

// ============================================================================
// Conversions into Value
// ============================================================================

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        // Values above i64::MAX have no Postgres integer type; keep them exact.
        match i64::try_from(v) {
            Ok(v) => Value::BigInt(v),
            Err(_) => Value::Decimal(v.to_string()),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Conversions out of Value
// ============================================================================

/// Conversion from a result-set value into a Rust field type.
///
/// Conversions are lenient across integer widths and accept the text forms a
/// text-format driver produces, but never silently truncate.
pub trait FromValue: Sized {
    /// Convert, naming the column in any error.
    fn from_value(value: &Value, column: &str) -> Result<Self>;
}

fn mismatch(column: &str, expected: &str, got: &Value) -> Error {
    Error::Mapping(format!(
        "column '{column}': expected {expected}, got {}",
        got.type_name()
    ))
}

impl FromValue for Value {
    fn from_value(value: &Value, _column: &str) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Text(s) if s == "t" || s == "true" => Ok(true),
            Value::Text(s) if s == "f" || s == "false" => Ok(false),
            other => Err(mismatch(column, "bool", other)),
        }
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value, column: &str) -> Result<Self> {
                    let wide = match value {
                        Value::Text(s) | Value::Decimal(s) => s
                            .parse::<i64>()
                            .map_err(|_| mismatch(column, stringify!($ty), value))?,
                        other => other
                            .as_i64()
                            .ok_or_else(|| mismatch(column, stringify!($ty), other))?,
                    };
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::Mapping(format!(
                            "column '{column}': value {wide} out of range for {}",
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i16, i32, i64, u32, u64);

impl FromValue for f64 {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        match value {
            Value::Text(s) => s.parse().map_err(|_| mismatch(column, "f64", value)),
            other => other.as_f64().ok_or_else(|| mismatch(column, "f64", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            other => f64::from_value(other, column).map(narrow_f64),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow_f64(v: f64) -> f32 {
    v as f32
}

impl FromValue for String {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        match value {
            Value::Null => Err(mismatch(column, "text", value)),
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            other => other.to_text().ok_or_else(|| mismatch(column, "text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(column, "bytes", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| {
                Error::Mapping(format!("column '{column}': invalid json: {e}"))
            }),
            other => Err(mismatch(column, "json", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, column: &str) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value, column).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(!Value::Int(10).is_zero());
        assert!(!Value::Text("x".into()).is_zero());
    }

    #[test]
    fn test_integer_widening_and_range() {
        assert_eq!(i64::from_value(&Value::Int(7), "id").unwrap(), 7);
        assert_eq!(i32::from_value(&Value::Text("42".into()), "id").unwrap(), 42);
        let err = i16::from_value(&Value::BigInt(1 << 40), "id").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_option_from_null() {
        let v: Option<String> = FromValue::from_value(&Value::Null, "name").unwrap();
        assert!(v.is_none());
        assert!(String::from_value(&Value::Null, "name").is_err());
    }

    #[test]
    fn test_u64_above_i64_stays_exact() {
        assert_eq!(Value::from(u64::MAX), Value::Decimal(u64::MAX.to_string()));
        assert_eq!(Value::from(5u64), Value::BigInt(5));
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(Value::Bool(true).to_text().as_deref(), Some("t"));
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_text().as_deref(), Some("\\xdead"));
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Null]).to_text().as_deref(),
            Some("{\"1\",NULL}")
        );
        assert_eq!(Value::Null.to_text(), None);
    }

    #[test]
    fn test_uuid_roundtrip_text() {
        let s = "550e8400-e29b-41d4-a716-446655440000";
        let bytes = parse_uuid(s).unwrap();
        assert_eq!(format_uuid(&bytes), s);
        assert!(parse_uuid("nope").is_none());
    }
}

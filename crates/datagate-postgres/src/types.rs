//! Value conversion between [`Value`] and the PostgreSQL text format.
//!
//! Parameters are always sent in text format. Text-like values go out with
//! OID 0 so the server infers the type from context (a `timestamptz` column
//! accepts an ISO-8601 string that way); numbers, booleans, bytea and uuid
//! carry their OID. Results are requested in text format and decoded by the
//! column's type OID.

use datagate_core::value::parse_uuid;
use datagate_core::{Error, Result, Value};

/// Wire format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Binary,
}

impl Format {
    pub const fn code(self) -> i16 {
        match self {
            Format::Text => 0,
            Format::Binary => 1,
        }
    }

    pub const fn from_code(code: i16) -> Self {
        if code == 1 { Format::Binary } else { Format::Text }
    }
}

/// Type OIDs the driver knows about.
pub mod oid {
    pub const UNSPECIFIED: u32 = 0;
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const JSON: u32 = 114;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const BOOL_ARRAY: u32 = 1000;
    pub const INT2_ARRAY: u32 = 1005;
    pub const INT4_ARRAY: u32 = 1007;
    pub const TEXT_ARRAY: u32 = 1009;
    pub const VARCHAR_ARRAY: u32 = 1015;
    pub const INT8_ARRAY: u32 = 1016;
    pub const FLOAT4_ARRAY: u32 = 1021;
    pub const FLOAT8_ARRAY: u32 = 1022;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const UUID_ARRAY: u32 = 2951;
    pub const JSONB: u32 = 3802;
}

/// Encode a parameter as `(text bytes, type OID)`; NULL becomes `None`.
pub fn encode_param(value: &Value) -> (Option<Vec<u8>>, u32) {
    let type_oid = match value {
        Value::Null => return (None, oid::UNSPECIFIED),
        Value::Bool(_) => oid::BOOL,
        Value::SmallInt(_) => oid::INT2,
        Value::Int(_) => oid::INT4,
        Value::BigInt(_) => oid::INT8,
        Value::Float(_) => oid::FLOAT4,
        Value::Double(_) => oid::FLOAT8,
        Value::Bytes(_) => oid::BYTEA,
        Value::Uuid(_) => oid::UUID,
        Value::Decimal(_) | Value::Text(_) | Value::Json(_) | Value::Array(_) => {
            oid::UNSPECIFIED
        }
    };
    (value.to_text().map(String::into_bytes), type_oid)
}

/// Decode one non-NULL column value.
pub fn decode_value(type_oid: u32, bytes: &[u8], format: Format) -> Result<Value> {
    if format == Format::Binary {
        return Ok(Value::Bytes(bytes.to_vec()));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Mapping(format!("column (oid {type_oid}) is not valid UTF-8: {e}")))?;
    decode_text(type_oid, text)
}

fn decode_text(type_oid: u32, text: &str) -> Result<Value> {
    let value = match type_oid {
        oid::BOOL => Value::Bool(parse_bool(text)?),
        oid::INT2 => Value::SmallInt(parse_num(type_oid, text)?),
        oid::INT4 => Value::Int(parse_num(type_oid, text)?),
        oid::INT8 => Value::BigInt(parse_num(type_oid, text)?),
        oid::OID => Value::BigInt(parse_num(type_oid, text)?),
        oid::FLOAT4 => Value::Float(parse_num(type_oid, text)?),
        oid::FLOAT8 => Value::Double(parse_num(type_oid, text)?),
        oid::NUMERIC => Value::Decimal(text.to_string()),
        oid::BYTEA => Value::Bytes(parse_bytea(text)?),
        oid::UUID => Value::Uuid(
            parse_uuid(text).ok_or_else(|| Error::Mapping(format!("invalid uuid: {text}")))?,
        ),
        oid::JSON | oid::JSONB => Value::Json(
            serde_json::from_str(text).map_err(|e| Error::Mapping(format!("invalid json: {e}")))?,
        ),
        oid::BOOL_ARRAY
        | oid::INT2_ARRAY
        | oid::INT4_ARRAY
        | oid::INT8_ARRAY
        | oid::TEXT_ARRAY
        | oid::VARCHAR_ARRAY
        | oid::FLOAT4_ARRAY
        | oid::FLOAT8_ARRAY
        | oid::UUID_ARRAY => {
            let element = element_oid(type_oid);
            let items = parse_array(text)?
                .into_iter()
                .map(|item| match item {
                    None => Ok(Value::Null),
                    Some(s) => decode_text(element, &s),
                })
                .collect::<Result<Vec<_>>>()?;
            Value::Array(items)
        }
        // Dates, times, intervals, enums and text types stay textual.
        _ => Value::Text(text.to_string()),
    };
    Ok(value)
}

const fn element_oid(array_oid: u32) -> u32 {
    match array_oid {
        oid::BOOL_ARRAY => oid::BOOL,
        oid::INT2_ARRAY => oid::INT2,
        oid::INT4_ARRAY => oid::INT4,
        oid::INT8_ARRAY => oid::INT8,
        oid::FLOAT4_ARRAY => oid::FLOAT4,
        oid::FLOAT8_ARRAY => oid::FLOAT8,
        oid::UUID_ARRAY => oid::UUID,
        _ => oid::TEXT,
    }
}

fn parse_bool(text: &str) -> Result<bool> {
    match text {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        other => Err(Error::Mapping(format!("invalid boolean: {other}"))),
    }
}

fn parse_num<T: std::str::FromStr>(type_oid: u32, text: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    text.parse()
        .map_err(|e| Error::Mapping(format!("invalid number for oid {type_oid}: {text} ({e})")))
}

fn parse_bytea(text: &str) -> Result<Vec<u8>> {
    let Some(hex) = text.strip_prefix("\\x") else {
        // Escape format is only produced with bytea_output=escape.
        return Ok(text.as_bytes().to_vec());
    };
    if hex.len() % 2 != 0 {
        return Err(Error::Mapping("bytea hex has odd length".to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::Mapping(format!("invalid bytea hex: {text}")))
        })
        .collect()
}

/// Split a one-dimensional array literal like `{1,NULL,"a,b"}`.
fn parse_array(text: &str) -> Result<Vec<Option<String>>> {
    let inner = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| Error::Mapping(format!("invalid array literal: {text}")))?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                was_quoted = true;
            }
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' if !quoted => {
                items.push(array_item(std::mem::take(&mut current), was_quoted));
                was_quoted = false;
            }
            '{' if !quoted => {
                return Err(Error::Mapping(
                    "multi-dimensional arrays are not supported".to_string(),
                ));
            }
            other => current.push(other),
        }
    }
    items.push(array_item(current, was_quoted));
    Ok(items)
}

fn array_item(raw: String, was_quoted: bool) -> Option<String> {
    if !was_quoted && raw == "NULL" {
        None
    } else {
        Some(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::value::format_uuid;

    fn decode(type_oid: u32, text: &str) -> Value {
        decode_value(type_oid, text.as_bytes(), Format::Text).unwrap()
    }

    #[test]
    fn test_encode_params() {
        assert_eq!(encode_param(&Value::Null), (None, oid::UNSPECIFIED));
        assert_eq!(
            encode_param(&Value::BigInt(42)),
            (Some(b"42".to_vec()), oid::INT8)
        );
        assert_eq!(encode_param(&Value::Bool(true)), (Some(b"t".to_vec()), oid::BOOL));
        assert_eq!(
            encode_param(&Value::Text("2024-01-02T03:04:05Z".into())),
            (Some(b"2024-01-02T03:04:05Z".to_vec()), oid::UNSPECIFIED)
        );
        assert_eq!(
            encode_param(&Value::Bytes(vec![0xde, 0xad])),
            (Some(b"\\xdead".to_vec()), oid::BYTEA)
        );
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(oid::BOOL, "t"), Value::Bool(true));
        assert_eq!(decode(oid::INT2, "-7"), Value::SmallInt(-7));
        assert_eq!(decode(oid::INT4, "12"), Value::Int(12));
        assert_eq!(decode(oid::INT8, "9000000000"), Value::BigInt(9_000_000_000));
        assert_eq!(decode(oid::FLOAT8, "1.5"), Value::Double(1.5));
        assert_eq!(decode(oid::NUMERIC, "12.50"), Value::Decimal("12.50".into()));
        assert_eq!(decode(oid::BYTEA, "\\x0aff"), Value::Bytes(vec![0x0a, 0xff]));
        assert_eq!(
            decode(1184, "2024-01-02 03:04:05+00"),
            Value::Text("2024-01-02 03:04:05+00".into())
        );
    }

    #[test]
    fn test_decode_uuid_and_json() {
        let v = decode(oid::UUID, "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11");
        match v {
            Value::Uuid(bytes) => {
                assert_eq!(format_uuid(&bytes), "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11");
            }
            other => panic!("expected uuid, got {other:?}"),
        }
        assert_eq!(
            decode(oid::JSONB, r#"{"a": 1}"#),
            Value::Json(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn test_decode_arrays() {
        assert_eq!(
            decode(oid::INT4_ARRAY, "{1,NULL,3}"),
            Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)])
        );
        assert_eq!(
            decode(oid::TEXT_ARRAY, r#"{plain,"a,b","say \"hi\"","NULL"}"#),
            Value::Array(vec![
                Value::Text("plain".into()),
                Value::Text("a,b".into()),
                Value::Text("say \"hi\"".into()),
                Value::Text("NULL".into()),
            ])
        );
        assert_eq!(decode(oid::TEXT_ARRAY, "{}"), Value::Array(Vec::new()));
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_value(oid::INT4, b"abc", Format::Text).is_err());
        assert!(decode_value(oid::BOOL, b"yes", Format::Text).is_err());
        assert!(decode_value(oid::BYTEA, b"\\xabc", Format::Text).is_err());
        assert!(decode_value(oid::TEXT, &[0xff, 0xfe], Format::Text).is_err());
    }

    #[test]
    fn test_binary_format_is_passed_through() {
        assert_eq!(
            decode_value(oid::INT4, &[0, 0, 0, 1], Format::Binary).unwrap(),
            Value::Bytes(vec![0, 0, 0, 1])
        );
        assert_eq!(Format::from_code(1), Format::Binary);
        assert_eq!(Format::Text.code(), 0);
    }
}

//! Record validation.
//!
//! [`Validator::validate`] walks a record's field table, evaluates each
//! field's `validate` rules in order and stops at the first rule a field
//! fails, so a record yields at most one [`Violation`] per field.
//! [`Validator::classify`] turns violations into aligned message/code lists:
//!
//! - a rule registered with [`Validator::register_custom`] reports
//!   `"<field> <custom message>"` and the custom code;
//! - any other rule reports its English message and its registry code
//!   followed by the field's `user_code`.
//!
//! `omitempty` skips the remaining rules of a field whose value is zero.
//!
//! # Example
//!
//! ```ignore
//! let mut validator = Validator::new(Arc::new(RuleRegistry::standard()));
//! validator.register_custom("myvalidate", |v, _| v.as_str() != Some("bad"), "is not allowed", "CUS1")?;
//!
//! if let Some(report) = validator.report(&user)? {
//!     return Err(report.classification());
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use datagate_core::validate::{matches_pattern, parse_rules};
use datagate_core::{Record, Value};

use crate::registry::RuleRegistry;
use crate::response::{Classification, ErrorResponse};
use crate::taxonomy::ErrorKind;

/// Control rule: skip the rest when the value is zero.
pub const OMITEMPTY: &str = "omitempty";

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const ALPHA_PATTERN: &str = r"^[a-zA-Z]+$";
const ALPHANUM_PATTERN: &str = r"^[a-zA-Z0-9]+$";
const NUMERIC_PATTERN: &str = r"^[-+]?[0-9]+(?:\.[0-9]+)?$";
const NUMBER_PATTERN: &str = r"^[0-9]+$";
const HEXADECIMAL_PATTERN: &str = r"^(0[xX])?[0-9a-fA-F]+$";
const E164_PATTERN: &str = r"^\+[1-9]?[0-9]{7,14}$";
const UUID_PATTERN: &str = r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";
const URL_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s]*$";
const URI_PATTERN: &str = r"^([a-zA-Z][a-zA-Z0-9+.-]*:|/)[^\s]*$";
const HTTP_URL_PATTERN: &str = r"^https?://[^\s/?#]+[^\s]*$";
const LATITUDE_PATTERN: &str = r"^[-+]?([1-8]?\d(\.\d+)?|90(\.0+)?)$";
const LONGITUDE_PATTERN: &str = r"^[-+]?(180(\.0+)?|((1[0-7]\d)|([1-9]?\d))(\.\d+)?)$";
const SEMVER_PATTERN: &str = r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";

/// Predicate of a custom rule: the field value and the rule parameter.
pub type CustomRule = Arc<dyn Fn(&Value, Option<&str>) -> bool + Send + Sync>;

struct CustomValidation {
    rule: CustomRule,
    message: String,
    code: String,
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Table of the record the field belongs to
    pub record: &'static str,
    pub field: &'static str,
    pub tag: String,
    pub param: Option<String>,
    pub user_code: Option<&'static str>,
    pub value: Value,
}

/// Aligned messages and codes for a set of violations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub messages: Vec<String>,
    pub codes: Vec<String>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn into_response(self) -> ErrorResponse {
        ErrorResponse::new(self.messages, self.codes)
    }

    /// The report as a `ValidationFailure` answered with 400.
    pub fn classification(self) -> Classification {
        Classification::new(
            ErrorKind::ValidationFailure,
            ErrorKind::ValidationFailure.default_status(),
            self.into_response(),
        )
    }
}

/// Misconfiguration detected while registering or evaluating rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// `register_custom` was given an empty tag
    EmptyTag,
    /// `register_custom` was given a tag that is already registered
    AlreadyRegistered(String),
    /// A field names a rule that is neither built in nor registered
    UnknownRule {
        record: &'static str,
        field: &'static str,
        tag: String,
    },
    /// A rule parameter is missing or malformed
    InvalidParam {
        field: &'static str,
        tag: String,
        param: Option<String>,
    },
    /// A rule does not apply to the field's value type
    Unsupported {
        field: &'static str,
        tag: String,
        value_type: &'static str,
    },
    /// A field carries rules but the record exposes no value for it
    MissingField {
        record: &'static str,
        field: &'static str,
    },
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorError::EmptyTag => write!(f, "validation tag cannot be empty"),
            ValidatorError::AlreadyRegistered(tag) => {
                write!(f, "validation tag '{tag}' is already registered")
            }
            ValidatorError::UnknownRule { record, field, tag } => {
                write!(f, "{record}.{field}: unknown validation rule '{tag}'")
            }
            ValidatorError::InvalidParam { field, tag, param } => match param {
                Some(p) => write!(f, "{field}: invalid parameter '{p}' for rule '{tag}'"),
                None => write!(f, "{field}: rule '{tag}' requires a parameter"),
            },
            ValidatorError::Unsupported {
                field,
                tag,
                value_type,
            } => write!(f, "{field}: rule '{tag}' does not apply to {value_type} values"),
            ValidatorError::MissingField { record, field } => {
                write!(f, "{record}.{field}: field has rules but no value accessor")
            }
        }
    }
}

impl std::error::Error for ValidatorError {}

/// Why a built-in rule could not be evaluated.
enum Fault {
    Unknown,
    Param,
    Unsupported,
}

/// Evaluates `validate` rules and classifies the result.
pub struct Validator {
    registry: Arc<RuleRegistry>,
    custom: HashMap<String, CustomValidation>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("Validator")
            .field("rules", &self.registry.len())
            .field("custom", &tags)
            .finish()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(RuleRegistry::standard()))
    }
}

impl Validator {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry,
            custom: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Register a rule with its own message and code.
    ///
    /// A custom rule takes precedence over a built-in rule of the same name.
    pub fn register_custom<F>(
        &mut self,
        tag: &str,
        rule: F,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<(), ValidatorError>
    where
        F: Fn(&Value, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ValidatorError::EmptyTag);
        }
        if self.custom.contains_key(tag) {
            return Err(ValidatorError::AlreadyRegistered(tag.to_string()));
        }
        self.custom.insert(
            tag.to_string(),
            CustomValidation {
                rule: Arc::new(rule),
                message: message.into(),
                code: code.into(),
            },
        );
        tracing::debug!(tag = tag, "registered custom validation");
        Ok(())
    }

    /// Evaluate every field's rules.
    pub fn validate<R: Record>(&self, record: &R) -> Result<Vec<Violation>, ValidatorError> {
        let mut violations = Vec::new();
        for field in R::fields() {
            let Some(rules) = field.rules() else {
                continue;
            };
            let value = record
                .field_value(field.name)
                .ok_or(ValidatorError::MissingField {
                    record: R::TABLE,
                    field: field.name,
                })?;

            for rule in parse_rules(rules) {
                if rule.tag == OMITEMPTY {
                    if value.is_zero() {
                        break;
                    }
                    continue;
                }
                let passed = match self.custom.get(rule.tag) {
                    Some(custom) => (custom.rule)(&value, rule.param),
                    None => evaluate(rule.tag, rule.param, &value).map_err(|fault| match fault {
                        Fault::Unknown => ValidatorError::UnknownRule {
                            record: R::TABLE,
                            field: field.name,
                            tag: rule.tag.to_string(),
                        },
                        Fault::Param => ValidatorError::InvalidParam {
                            field: field.name,
                            tag: rule.tag.to_string(),
                            param: rule.param.map(str::to_string),
                        },
                        Fault::Unsupported => ValidatorError::Unsupported {
                            field: field.name,
                            tag: rule.tag.to_string(),
                            value_type: value.type_name(),
                        },
                    })?,
                };
                if !passed {
                    violations.push(Violation {
                        record: R::TABLE,
                        field: field.name,
                        tag: rule.tag.to_string(),
                        param: rule.param.map(str::to_string),
                        user_code: field.user_code,
                        value: value.clone(),
                    });
                    break;
                }
            }
        }
        Ok(violations)
    }

    /// Messages and codes for `violations`, in order.
    pub fn classify(&self, violations: &[Violation]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for v in violations {
            if let Some(custom) = self.custom.get(&v.tag) {
                report.messages.push(format!("{} {}", v.field, custom.message));
                report.codes.push(custom.code.clone());
                continue;
            }
            let code = self.registry.code(&v.tag).unwrap_or_else(|| {
                tracing::warn!(tag = %v.tag, "validation rule has no registry code");
                ""
            });
            report.messages.push(message(v));
            report
                .codes
                .push(format!("{code}{}", v.user_code.unwrap_or_default()));
        }
        report
    }

    /// Validate and classify in one step; `None` when the record is valid.
    pub fn report<R: Record>(&self, record: &R) -> Result<Option<ValidationReport>, ValidatorError> {
        let violations = self.validate(record)?;
        if violations.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.classify(&violations)))
    }
}

// ============================================================================
// Built-in rules
// ============================================================================

fn evaluate(tag: &str, param: Option<&str>, value: &Value) -> Result<bool, Fault> {
    match tag {
        "required" => Ok(!value.is_zero()),
        "min" => compare(value, param, |m, p| m >= p),
        "max" => compare(value, param, |m, p| m <= p),
        "len" => compare(value, param, |m, p| m == p),
        "gt" => compare(value, param, |m, p| m > p),
        "gte" => compare(value, param, |m, p| m >= p),
        "lt" => compare(value, param, |m, p| m < p),
        "lte" => compare(value, param, |m, p| m <= p),
        "eq" => equals(value, param),
        "ne" => equals(value, param).map(|eq| !eq),
        "eq_ignore_case" => Ok(text(value)?.eq_ignore_ascii_case(required_param(param)?)),
        "ne_ignore_case" => Ok(!text(value)?.eq_ignore_ascii_case(required_param(param)?)),
        "oneof" => one_of(value, param),
        "contains" => Ok(text(value)?.contains(required_param(param)?)),
        "excludes" => Ok(!text(value)?.contains(required_param(param)?)),
        "startswith" => Ok(text(value)?.starts_with(required_param(param)?)),
        "endswith" => Ok(text(value)?.ends_with(required_param(param)?)),
        "lowercase" => {
            let s = text(value)?;
            Ok(!s.is_empty() && s == s.to_lowercase())
        }
        "uppercase" => {
            let s = text(value)?;
            Ok(!s.is_empty() && s == s.to_uppercase())
        }
        "ascii" => Ok(text(value)?.is_ascii()),
        "email" => pattern(value, EMAIL_PATTERN),
        "alpha" => pattern(value, ALPHA_PATTERN),
        "alphanum" => pattern(value, ALPHANUM_PATTERN),
        "hexadecimal" => pattern(value, HEXADECIMAL_PATTERN),
        "e164" => pattern(value, E164_PATTERN),
        "url" => pattern(value, URL_PATTERN),
        "uri" => pattern(value, URI_PATTERN),
        "http_url" => pattern(value, HTTP_URL_PATTERN),
        "semver" => pattern(value, SEMVER_PATTERN),
        "numeric" => match value {
            Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) | Value::Float(_) | Value::Double(_) => Ok(true),
            _ => pattern(value, NUMERIC_PATTERN),
        },
        "number" => match value {
            Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => Ok(true),
            _ => pattern(value, NUMBER_PATTERN),
        },
        "uuid" => match value {
            Value::Uuid(_) => Ok(true),
            _ => pattern(value, UUID_PATTERN),
        },
        "boolean" => match value {
            Value::Bool(_) => Ok(true),
            _ => Ok(matches!(
                text(value)?,
                "1" | "t" | "T" | "TRUE" | "true" | "True" | "0" | "f" | "F" | "FALSE" | "false" | "False"
            )),
        },
        "json" => match value {
            Value::Json(_) => Ok(true),
            _ => Ok(serde_json::from_str::<serde_json::Value>(text(value)?).is_ok()),
        },
        "latitude" => coordinate(value, LATITUDE_PATTERN, 90.0),
        "longitude" => coordinate(value, LONGITUDE_PATTERN, 180.0),
        "ipv4" => Ok(text(value)?.parse::<std::net::Ipv4Addr>().is_ok()),
        "ipv6" => Ok(text(value)?.parse::<std::net::Ipv6Addr>().is_ok()),
        "ip" => Ok(text(value)?.parse::<std::net::IpAddr>().is_ok()),
        _ => Err(Fault::Unknown),
    }
}

/// Text of a value; NULL reads as the empty string.
fn text(value: &Value) -> Result<&str, Fault> {
    match value {
        Value::Null => Ok(""),
        other => other.as_str().ok_or(Fault::Unsupported),
    }
}

fn required_param(param: Option<&str>) -> Result<&str, Fault> {
    param.ok_or(Fault::Param)
}

fn pattern(value: &Value, pattern: &str) -> Result<bool, Fault> {
    Ok(matches_pattern(text(value)?, pattern))
}

fn coordinate(value: &Value, text_pattern: &str, bound: f64) -> Result<bool, Fault> {
    match value {
        Value::Text(_) | Value::Decimal(_) | Value::Null => pattern(value, text_pattern),
        other => other
            .as_f64()
            .map(|v| (-bound..=bound).contains(&v))
            .ok_or(Fault::Unsupported),
    }
}

fn is_number(value: &Value) -> bool {
    matches!(
        value,
        Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) | Value::Float(_) | Value::Double(_) | Value::Decimal(_)
    )
}

/// Size rules: numbers compare by value, everything else by length.
fn compare(value: &Value, param: Option<&str>, holds: impl Fn(f64, f64) -> bool) -> Result<bool, Fault> {
    let param = required_param(param)?;
    if is_number(value) {
        let limit: f64 = param.parse().map_err(|_| Fault::Param)?;
        let v = value.as_f64().ok_or(Fault::Unsupported)?;
        return Ok(holds(v, limit));
    }
    let limit: usize = param.parse().map_err(|_| Fault::Param)?;
    let len = match value {
        Value::Null => 0,
        other => other.char_len().ok_or(Fault::Unsupported)?,
    };
    Ok(holds(len as f64, limit as f64))
}

/// `eq`: text by content, numbers by value, collections by length.
fn equals(value: &Value, param: Option<&str>) -> Result<bool, Fault> {
    match value {
        Value::Text(s) => Ok(s == required_param(param)?),
        Value::Bool(b) => {
            let expected: bool = required_param(param)?.parse().map_err(|_| Fault::Param)?;
            Ok(*b == expected)
        }
        _ => compare(value, param, |m, p| (m - p).abs() < f64::EPSILON),
    }
}

fn one_of(value: &Value, param: Option<&str>) -> Result<bool, Fault> {
    let choices: Vec<&str> = required_param(param)?.split_whitespace().collect();
    let candidate = match value {
        Value::Text(s) | Value::Decimal(s) => s.clone(),
        Value::Null => String::new(),
        other => match other.as_i64() {
            Some(n) => n.to_string(),
            None => return Err(Fault::Unsupported),
        },
    };
    Ok(choices.contains(&candidate.as_str()))
}

// ============================================================================
// Messages
// ============================================================================

fn plural(count: &str, unit: &str) -> String {
    if count == "1" {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// What a size rule measures, as worded in its message.
fn size_unit(value: &Value) -> Option<&'static str> {
    match value {
        Value::Array(_) | Value::Bytes(_) => Some("item"),
        v if is_number(v) => None,
        _ => Some("character"),
    }
}

/// English message for a built-in rule.
fn message(v: &Violation) -> String {
    let field = v.field;
    let p = v.param.as_deref().unwrap_or_default();
    let unit = size_unit(&v.value);
    match (v.tag.as_str(), unit) {
        ("required", _) => format!("{field} is a required field"),
        ("min" | "gte", Some("item")) => format!("{field} must contain at least {}", plural(p, "item")),
        ("min" | "gte", Some(u)) => format!("{field} must be at least {} in length", plural(p, u)),
        ("min" | "gte", None) => format!("{field} must be {p} or greater"),
        ("max" | "lte", Some("item")) => format!("{field} must contain at maximum {}", plural(p, "item")),
        ("max" | "lte", Some(u)) => format!("{field} must be a maximum of {} in length", plural(p, u)),
        ("max" | "lte", None) => format!("{field} must be {p} or less"),
        ("len", Some("item")) => format!("{field} must contain {}", plural(p, "item")),
        ("len", Some(u)) => format!("{field} must be {} in length", plural(p, u)),
        ("len", None) => format!("{field} must be equal to {p}"),
        ("gt", Some("item")) => format!("{field} must contain more than {}", plural(p, "item")),
        ("gt", Some(u)) => format!("{field} must be greater than {} in length", plural(p, u)),
        ("gt", None) => format!("{field} must be greater than {p}"),
        ("lt", Some("item")) => format!("{field} must contain less than {}", plural(p, "item")),
        ("lt", Some(u)) => format!("{field} must be less than {} in length", plural(p, u)),
        ("lt", None) => format!("{field} must be less than {p}"),
        ("eq", _) => format!("{field} is not equal to {p}"),
        ("ne", _) => format!("{field} should not be equal to {p}"),
        ("oneof", _) => format!("{field} must be one of [{p}]"),
        ("email", _) => format!("{field} must be a valid email address"),
        ("alpha", _) => format!("{field} can only contain alphabetic characters"),
        ("alphanum", _) => format!("{field} can only contain alphanumeric characters"),
        ("numeric", _) => format!("{field} must be a valid numeric value"),
        ("number", _) => format!("{field} must be a valid number"),
        ("hexadecimal", _) => format!("{field} must be a valid hexadecimal"),
        ("e164", _) => format!("{field} must be a valid E.164 formatted phone number"),
        ("uuid", _) => format!("{field} must be a valid UUID"),
        ("url" | "http_url", _) => format!("{field} must be a valid URL"),
        ("uri", _) => format!("{field} must be a valid URI"),
        ("ascii", _) => format!("{field} must contain only ascii characters"),
        ("boolean", _) => format!("{field} must be a valid boolean value"),
        ("contains", _) => format!("{field} must contain the text '{p}'"),
        ("excludes", _) => format!("{field} cannot contain the text '{p}'"),
        ("startswith", _) => format!("{field} must start with text '{p}'"),
        ("endswith", _) => format!("{field} must end with text '{p}'"),
        ("lowercase", _) => format!("{field} must be a lowercase string"),
        ("uppercase", _) => format!("{field} must be an uppercase string"),
        ("json", _) => format!("{field} must be a valid json string"),
        ("latitude", _) => format!("{field} must contain valid latitude coordinates"),
        ("longitude", _) => format!("{field} must contain a valid longitude coordinates"),
        ("semver", _) => format!("{field} must be a valid semver version"),
        ("ipv4", _) => format!("{field} must be a valid IPv4 address"),
        ("ipv6", _) => format!("{field} must be a valid IPv6 address"),
        ("ip", _) => format!("{field} must be a valid IP address"),
        (tag, _) => format!(
            "Key: '{}.{field}' Error:Field validation for '{field}' failed on the '{tag}' tag",
            v.record
        ),
    }
}

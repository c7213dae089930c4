//! Records and the attribute projector.
//!
//! A record type describes its fields with a static [`FieldSpec`] table: the
//! column name used when reading (`select`), the column name used when writing
//! (`write`), its validation rules and an optional per-field user code. A field
//! whose tag for a category is absent, empty or `"-"` is left out of that
//! category. Leaving a tag out is never an error.
//!
//! The projector functions ([`select_columns`], [`write_map`]) walk that table
//! in declaration order, so equal inputs always produce equal SQL.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug, Default, Record)]
//! #[record(table = "users")]
//! struct User {
//!     #[record(select = "id")]
//!     id: i64,
//!     #[record(select = "name", write = "name", validate = "required,min=5")]
//!     name: String,
//! }
//!
//! assert_eq!(select_columns::<User>(), vec!["id", "name"]);
//! let map = write_map(&user)?; // [("name", Value::Text(..))]
//! ```

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;

/// Tag value that explicitly excludes a field from a category.
pub const IGNORE: &str = "-";

/// Whether a tag value excludes its field.
pub fn is_excluded(tag: &str) -> bool {
    let tag = tag.trim();
    tag.is_empty() || tag == IGNORE
}

/// Declarative description of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Rust field name
    pub name: &'static str,
    /// Column name used when reading
    pub select: Option<&'static str>,
    /// Column name used when writing
    pub write: Option<&'static str>,
    /// Comma-separated validation rules (`required,min=5`)
    pub validate: Option<&'static str>,
    /// Suffix appended to validation codes for this field
    pub user_code: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            select: None,
            write: None,
            validate: None,
            user_code: None,
        }
    }

    #[must_use]
    pub const fn select(mut self, column: &'static str) -> Self {
        self.select = Some(column);
        self
    }

    #[must_use]
    pub const fn write(mut self, column: &'static str) -> Self {
        self.write = Some(column);
        self
    }

    #[must_use]
    pub const fn validate(mut self, rules: &'static str) -> Self {
        self.validate = Some(rules);
        self
    }

    #[must_use]
    pub const fn user_code(mut self, code: &'static str) -> Self {
        self.user_code = Some(code);
        self
    }

    /// Read column, if the field takes part in reads.
    pub fn select_column(&self) -> Option<&'static str> {
        self.select.filter(|t| !is_excluded(t)).map(str::trim)
    }

    /// Write column, if the field takes part in writes.
    pub fn write_column(&self) -> Option<&'static str> {
        self.write.filter(|t| !is_excluded(t)).map(str::trim)
    }

    /// Validation rules, if any.
    pub fn rules(&self) -> Option<&'static str> {
        self.validate.filter(|t| !is_excluded(t))
    }

    /// Whether a result column binds to this field (lax, case-insensitive).
    pub fn binds_column(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
            || self
                .select_column()
                .is_some_and(|c| c.eq_ignore_ascii_case(column))
    }
}

/// A domain entity with a declarative field table.
///
/// Usually implemented with `#[derive(Record)]`, which generates the table at
/// build time and rejects field types that cannot become a [`Value`].
pub trait Record: Sized {
    /// Default relation for statements about this record.
    const TABLE: &'static str;

    /// Field table in declaration order.
    fn fields() -> &'static [FieldSpec];

    /// Current value of a field by Rust name, `None` for an unknown name.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Assign a field from a result value. Returns `Ok(false)` for an unknown
    /// name and an error when the value does not fit the field type.
    fn set_field(&mut self, field: &str, value: &Value) -> Result<bool>;
}

// ============================================================================
// Projector
// ============================================================================

/// Ordered read columns of a record type.
pub fn select_columns<R: Record>() -> Vec<&'static str> {
    R::fields()
        .iter()
        .filter_map(FieldSpec::select_column)
        .collect()
}

/// Ordered `(column, value)` pairs for a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteMap {
    entries: Vec<(&'static str, Value)>,
}

impl WriteMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(c, _)| *c).collect()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(c, v)| (*c, v))
    }

    /// Drop a column, e.g. a key that belongs in the predicate instead.
    #[must_use]
    pub fn without(mut self, column: &str) -> Self {
        self.entries.retain(|(c, _)| *c != column);
        self
    }

    pub fn into_parts(self) -> (Vec<&'static str>, Vec<Value>) {
        self.entries.into_iter().unzip()
    }
}

impl IntoIterator for WriteMap {
    type Item = (&'static str, Value);
    type IntoIter = std::vec::IntoIter<(&'static str, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Derive the write map of a record.
///
/// Fails when a write-tagged field has no accessor or two fields claim the same
/// column: both are programming errors and must not silently drop data.
pub fn write_map<R: Record>(record: &R) -> Result<WriteMap> {
    let mut entries: Vec<(&'static str, Value)> = Vec::new();
    for field in R::fields() {
        let Some(column) = field.write_column() else {
            continue;
        };
        if entries.iter().any(|(c, _)| *c == column) {
            return Err(Error::Mapping(format!(
                "{}: column '{column}' is written by more than one field",
                R::TABLE
            )));
        }
        let value = record.field_value(field.name).ok_or_else(|| {
            Error::Mapping(format!(
                "{}: field '{}' is tagged for writes but has no value accessor",
                R::TABLE,
                field.name
            ))
        })?;
        entries.push((column, value));
    }
    Ok(WriteMap { entries })
}

// ============================================================================
// Row materialization
// ============================================================================

/// Types that can be built from a result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

/// Bind a row onto a default record by column name.
///
/// Matching is case-insensitive against the field name or its select column.
/// Columns with no matching field are ignored, so joined or aggregated
/// projections still bind.
pub fn bind_lax<R: Record + Default>(row: &Row) -> Result<R> {
    let mut record = R::default();
    for (column, value) in row.iter() {
        let Some(field) = R::fields().iter().find(|f| f.binds_column(column)) else {
            continue;
        };
        record.set_field(field.name, value)?;
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FromValue;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct User {
        id: i64,
        name: String,
        email: String,
        role: String,
    }

    static USER_FIELDS: [FieldSpec; 4] = [
        FieldSpec::new("id").select("id"),
        FieldSpec::new("name")
            .select("name")
            .write("name")
            .validate("required,min=5")
            .user_code("N1"),
        FieldSpec::new("email").select("email").write("email"),
        FieldSpec::new("role").select("role").write("-"),
    ];

    impl Record for User {
        const TABLE: &'static str = "users";

        fn fields() -> &'static [FieldSpec] {
            &USER_FIELDS
        }

        fn field_value(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(Value::from(self.id)),
                "name" => Some(Value::from(&self.name)),
                "email" => Some(Value::from(&self.email)),
                "role" => Some(Value::from(&self.role)),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: &Value) -> Result<bool> {
            match field {
                "id" => self.id = FromValue::from_value(value, field)?,
                "name" => self.name = FromValue::from_value(value, field)?,
                "email" => self.email = FromValue::from_value(value, field)?,
                "role" => self.role = FromValue::from_value(value, field)?,
                _ => return Ok(false),
            }
            Ok(true)
        }
    }

    /// A record whose table claims a field it cannot read.
    struct Broken;

    static BROKEN_FIELDS: [FieldSpec; 1] = [FieldSpec::new("ghost").write("ghost")];

    impl Record for Broken {
        const TABLE: &'static str = "broken";

        fn fields() -> &'static [FieldSpec] {
            &BROKEN_FIELDS
        }

        fn field_value(&self, _field: &str) -> Option<Value> {
            None
        }

        fn set_field(&mut self, _field: &str, _value: &Value) -> Result<bool> {
            Ok(false)
        }
    }

    fn sample() -> User {
        User {
            id: 7,
            name: "Johnny".into(),
            email: "j@example.com".into(),
            role: "admin".into(),
        }
    }

    #[test]
    fn test_select_columns_in_declaration_order() {
        assert_eq!(select_columns::<User>(), vec!["id", "name", "email", "role"]);
    }

    #[test]
    fn test_write_map_contains_exactly_write_tagged_fields() {
        let user = sample();
        let map = write_map(&user).unwrap();
        assert_eq!(map.columns(), vec!["name", "email"]);
        assert_eq!(map.get("name"), Some(&Value::Text("Johnny".into())));
        assert_eq!(map.get("email"), Some(&Value::Text("j@example.com".into())));
        assert!(map.get("id").is_none());
        assert!(map.get("role").is_none());
    }

    #[test]
    fn test_write_map_is_deterministic() {
        let user = sample();
        assert_eq!(write_map(&user).unwrap(), write_map(&user.clone()).unwrap());
    }

    #[test]
    fn test_missing_accessor_fails_loudly() {
        let err = write_map(&Broken).unwrap_err();
        assert!(matches!(err, Error::Mapping(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_excluded_tags() {
        assert!(is_excluded(""));
        assert!(is_excluded(" - "));
        assert!(!is_excluded("name"));
        assert_eq!(USER_FIELDS[3].write_column(), None);
        assert_eq!(USER_FIELDS[1].rules(), Some("required,min=5"));
    }

    #[test]
    fn test_bind_lax_ignores_unknown_columns() {
        let row = Row::new(
            vec!["ID".into(), "Name".into(), "post_count".into()],
            vec![Value::BigInt(3), Value::Text("Ada".into()), Value::BigInt(12)],
        );
        let user: User = bind_lax(&row).unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "");
    }

    #[test]
    fn test_bind_lax_reports_type_mismatch() {
        let row = Row::new(vec!["id".into()], vec![Value::Text("abc".into())]);
        assert!(bind_lax::<User>(&row).is_err());
    }

    #[test]
    fn test_write_map_without_and_parts() {
        let (cols, values) = write_map(&sample()).unwrap().without("email").into_parts();
        assert_eq!(cols, vec!["name"]);
        assert_eq!(values, vec![Value::Text("Johnny".into())]);
    }
}

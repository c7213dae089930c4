//! Statement builders for SELECT, INSERT, UPDATE and DELETE.
//!
//! Builders take their column lists from the record's field table, so a
//! record type with `select` and `write` tags needs no hand-written SQL for
//! the common cases. They support:
//! - RETURNING clause (PostgreSQL)
//! - Bulk inserts
//! - UPSERT (ON CONFLICT)
//! - Explicit column SET for updates
//! - Pagination
//!
//! Every builder implements [`BuildStatement`]. Building fails instead of
//! producing SQL that would do something surprising (an INSERT with no
//! columns, an UPDATE or DELETE without a predicate).

use std::marker::PhantomData;

use datagate_core::{
    BuildStatement, Error, Record, Result, Statement, StatementKind, Value, select_columns,
    write_map,
};

use crate::expr::Expr;
use crate::page::Page;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub const fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Conflict resolution strategy for INSERT operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
    /// INSERT ... ON CONFLICT DO NOTHING
    DoNothing,
    /// INSERT ... ON CONFLICT (target) DO UPDATE SET col = EXCLUDED.col
    DoUpdate {
        /// The conflict target columns.
        target: Vec<String>,
        /// The columns to update. If empty, every inserted column is updated.
        columns: Vec<String>,
    },
}

fn finish(
    kind: StatementKind,
    table: &str,
    built: (String, Vec<Value>),
    returning: bool,
) -> Statement {
    let (sql, params) = built;
    tracing::trace!(
        kind = kind.as_str(),
        table = table,
        params = params.len(),
        "built statement"
    );
    Statement::new(kind, table, sql, params, returning)
}

fn and_filter(existing: Option<Expr>, expr: Expr) -> Option<Expr> {
    Some(match existing {
        Some(existing) => existing.and(expr),
        None => expr,
    })
}

fn push_where(sql: &mut String, params: &mut Vec<Value>, filter: Option<&Expr>) {
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        filter.render(sql, params);
    }
}

fn returning_list<R: Record>() -> String {
    let columns = select_columns::<R>();
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    }
}

fn push_on_conflict(sql: &mut String, on_conflict: Option<&OnConflict>, inserted: &[&str]) {
    match on_conflict {
        None => {}
        Some(OnConflict::DoNothing) => sql.push_str(" ON CONFLICT DO NOTHING"),
        Some(OnConflict::DoUpdate { target, columns }) => {
            sql.push_str(" ON CONFLICT");
            if !target.is_empty() {
                sql.push_str(&format!(" ({})", target.join(", ")));
            }
            sql.push_str(" DO UPDATE SET ");
            let update_cols: Vec<String> = if columns.is_empty() {
                inserted
                    .iter()
                    .filter(|c| !target.iter().any(|t| t == *c))
                    .map(|c| format!("{c} = EXCLUDED.{c}"))
                    .collect()
            } else {
                columns
                    .iter()
                    .map(|c| format!("{c} = EXCLUDED.{c}"))
                    .collect()
            };
            sql.push_str(&update_cols.join(", "));
        }
    }
}

// ============================================================================
// SELECT
// ============================================================================

/// SELECT builder.
///
/// # Example
///
/// ```ignore
/// let stmt = Select::<User>::new()
///     .filter(Expr::col("role").eq("admin"))
///     .order_by("id", Order::Desc)
///     .page(Page::new(2, 20))
///     .build_statement()?;
/// ```
#[derive(Debug, Clone)]
pub struct Select<R: Record> {
    table: String,
    columns: Option<Vec<String>>,
    filter: Option<Expr>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> Default for Select<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Select<R> {
    /// Select the record's read columns from its table.
    pub fn new() -> Self {
        Self {
            table: R::TABLE.to_string(),
            columns: None,
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    /// Read from another relation (a view or a join expression).
    pub fn from(mut self, relation: impl Into<String>) -> Self {
        self.table = relation.into();
        self
    }

    /// Replace the projected columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = and_filter(self.filter, expr);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Apply `LIMIT limit OFFSET (skip - 1) * limit`.
    pub fn page(self, page: Page) -> Self {
        let offset = page.offset();
        self.limit(page.limit).offset(offset)
    }

    /// Build the SELECT SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let columns: Vec<String> = match &self.columns {
            Some(columns) => columns.clone(),
            None => select_columns::<R>()
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        if columns.is_empty() {
            return Err(Error::Custom(format!(
                "select from {}: no columns to read",
                self.table
            )));
        }

        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.table);
        push_where(&mut sql, &mut params, self.filter.as_ref());

        if !self.order.is_empty() {
            let parts: Vec<String> = self
                .order
                .iter()
                .map(|(c, o)| format!("{c} {}", o.as_str()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok((sql, params))
    }
}

impl<R: Record> BuildStatement for Select<R> {
    fn build_statement(&self) -> Result<Statement> {
        Ok(finish(
            StatementKind::Select,
            &self.table,
            self.build()?,
            false,
        ))
    }
}

// ============================================================================
// INSERT
// ============================================================================

/// INSERT builder for one record.
///
/// # Example
///
/// ```ignore
/// let stmt = Insert::new(&user).returning().build_statement()?;
/// let stored: User = insert_returning(&cx, &conn, &stmt).await?;
/// ```
#[derive(Debug)]
pub struct Insert<'a, R: Record> {
    record: &'a R,
    returning: bool,
    on_conflict: Option<OnConflict>,
}

impl<'a, R: Record> Insert<'a, R> {
    pub fn new(record: &'a R) -> Self {
        Self {
            record,
            returning: false,
            on_conflict: None,
        }
    }

    /// Return the stored row (the record's read columns).
    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Handle conflicts by doing nothing (ON CONFLICT DO NOTHING).
    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.on_conflict = Some(OnConflict::DoNothing);
        self
    }

    /// Handle conflicts on `target` by updating `columns` (UPSERT).
    ///
    /// If `columns` is empty, every inserted column except the target is
    /// updated.
    pub fn on_conflict_do_update(mut self, target: &[&str], columns: &[&str]) -> Self {
        self.on_conflict = Some(OnConflict::DoUpdate {
            target: target.iter().map(|s| (*s).to_string()).collect(),
            columns: columns.iter().map(|s| (*s).to_string()).collect(),
        });
        self
    }

    /// Build the INSERT SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let (columns, values) = write_map(self.record)?.into_parts();
        if columns.is_empty() {
            return Err(Error::Custom(format!(
                "insert into {}: record has no write-tagged fields",
                R::TABLE
            )));
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("${i}")).collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            columns.join(", "),
            placeholders.join(", ")
        );
        push_on_conflict(&mut sql, self.on_conflict.as_ref(), &columns);
        if self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(&returning_list::<R>());
        }
        Ok((sql, values))
    }
}

impl<R: Record> BuildStatement for Insert<'_, R> {
    fn build_statement(&self) -> Result<Statement> {
        Ok(finish(
            StatementKind::Insert,
            R::TABLE,
            self.build()?,
            self.returning,
        ))
    }
}

/// Most bind parameters one statement may carry; the extended protocol counts
/// them in an unsigned 16-bit field.
pub const MAX_PARAMS: usize = u16::MAX as usize;

/// Bulk INSERT builder: one VALUES group per record.
///
/// [`build`](Self::build) produces a single statement and fails when the
/// records need more than [`MAX_PARAMS`] parameters;
/// [`build_statements`](Self::build_statements) splits them into as many
/// statements as needed.
///
/// # Example
///
/// ```ignore
/// let stmt = InsertMany::new(&users).build_statement()?;
/// let inserted = exec(&cx, &conn, &stmt).await?;
/// ```
#[derive(Debug)]
pub struct InsertMany<'a, R: Record> {
    records: &'a [R],
    returning: bool,
    on_conflict: Option<OnConflict>,
    max_params: usize,
}

impl<'a, R: Record> InsertMany<'a, R> {
    pub fn new(records: &'a [R]) -> Self {
        Self {
            records,
            returning: false,
            on_conflict: None,
            max_params: MAX_PARAMS,
        }
    }

    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.on_conflict = Some(OnConflict::DoNothing);
        self
    }

    /// Lower the per-statement parameter limit; values above [`MAX_PARAMS`]
    /// are clamped.
    pub fn max_params(mut self, max_params: usize) -> Self {
        self.max_params = max_params.min(MAX_PARAMS);
        self
    }

    /// Number of records in the statement.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build the bulk INSERT SQL and parameters as one statement.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let columns = self.columns()?;
        let params = columns.len() * self.records.len();
        if params > self.max_params {
            return Err(Error::Custom(format!(
                "insert into {}: {} records need {params} parameters, more than {} per statement",
                R::TABLE,
                self.records.len(),
                self.max_params
            )));
        }
        self.build_group(&columns, self.records)
    }

    /// Build one statement per chunk of records, each within the parameter
    /// limit, in record order.
    pub fn build_statements(&self) -> Result<Vec<Statement>> {
        let columns = self.columns()?;
        let per_statement = self.max_params / columns.len();
        if per_statement == 0 {
            return Err(Error::Custom(format!(
                "insert into {}: {} columns exceed {} parameters per statement",
                R::TABLE,
                columns.len(),
                self.max_params
            )));
        }
        self.records
            .chunks(per_statement)
            .map(|chunk| {
                let built = self.build_group(&columns, chunk)?;
                Ok(finish(StatementKind::Insert, R::TABLE, built, self.returning))
            })
            .collect()
    }

    fn columns(&self) -> Result<Vec<&'static str>> {
        let Some(first) = self.records.first() else {
            return Err(Error::Custom(format!(
                "insert into {}: no records to insert",
                R::TABLE
            )));
        };
        let columns = write_map(first)?.columns();
        if columns.is_empty() {
            return Err(Error::Custom(format!(
                "insert into {}: record has no write-tagged fields",
                R::TABLE
            )));
        }
        Ok(columns)
    }

    fn build_group(&self, columns: &[&'static str], records: &[R]) -> Result<(String, Vec<Value>)> {
        let mut all_values = Vec::with_capacity(columns.len() * records.len());
        let mut value_groups = Vec::with_capacity(records.len());
        for record in records {
            let (_, values) = write_map(record)?.into_parts();
            let start = all_values.len() + 1;
            let placeholders: Vec<String> = (start..start + values.len())
                .map(|i| format!("${i}"))
                .collect();
            value_groups.push(format!("({})", placeholders.join(", ")));
            all_values.extend(values);
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            R::TABLE,
            columns.join(", "),
            value_groups.join(", ")
        );
        push_on_conflict(&mut sql, self.on_conflict.as_ref(), columns);
        if self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(&returning_list::<R>());
        }
        Ok((sql, all_values))
    }
}

impl<R: Record> BuildStatement for InsertMany<'_, R> {
    fn build_statement(&self) -> Result<Statement> {
        Ok(finish(
            StatementKind::Insert,
            R::TABLE,
            self.build()?,
            self.returning,
        ))
    }
}

// ============================================================================
// UPDATE
// ============================================================================

/// UPDATE builder.
///
/// # Example
///
/// ```ignore
/// // Write every write-tagged field of a record
/// Update::new(&user).filter(Expr::col("id").eq(user.id));
///
/// // Explicit SET without a record
/// Update::<User>::empty()
///     .set("role", "cashier")
///     .filter(Expr::col("id").eq(42));
/// ```
#[derive(Debug)]
pub struct Update<'a, R: Record> {
    record: Option<&'a R>,
    explicit_sets: Vec<(String, Value)>,
    set_only: Option<Vec<String>>,
    filter: Option<Expr>,
    all_rows: bool,
    returning: bool,
}

impl<'a, R: Record> Update<'a, R> {
    /// Update from a record's write map.
    pub fn new(record: &'a R) -> Self {
        Self {
            record: Some(record),
            explicit_sets: Vec::new(),
            set_only: None,
            filter: None,
            all_rows: false,
            returning: false,
        }
    }

    /// Update with explicit SET clauses only.
    pub fn empty() -> Self {
        Self {
            record: None,
            explicit_sets: Vec::new(),
            set_only: None,
            filter: None,
            all_rows: false,
            returning: false,
        }
    }

    /// Set a column to a value. Overrides the record's value for that column.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.explicit_sets.push((column.to_string(), value.into()));
        self
    }

    /// Only write these columns from the record.
    pub fn set_only(mut self, columns: &[&str]) -> Self {
        self.set_only = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = and_filter(self.filter, expr);
        self
    }

    /// Allow the statement to touch every row of the table.
    pub fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }

    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Build the UPDATE SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.filter.is_none() && !self.all_rows {
            return Err(Error::Custom(format!(
                "update {}: missing WHERE clause (use all_rows() to update every row)",
                R::TABLE
            )));
        }

        let mut params = Vec::new();
        let mut set_clauses = Vec::new();
        for (column, value) in &self.explicit_sets {
            params.push(value.clone());
            set_clauses.push(format!("{column} = ${}", params.len()));
        }

        if let Some(record) = self.record {
            for (column, value) in write_map(record)? {
                if self.explicit_sets.iter().any(|(c, _)| c == column) {
                    continue;
                }
                if let Some(only) = &self.set_only {
                    if !only.iter().any(|c| c == column) {
                        continue;
                    }
                }
                params.push(value);
                set_clauses.push(format!("{column} = ${}", params.len()));
            }
        }

        if set_clauses.is_empty() {
            return Err(Error::Custom(format!(
                "update {}: nothing to set",
                R::TABLE
            )));
        }

        let mut sql = format!("UPDATE {} SET {}", R::TABLE, set_clauses.join(", "));
        push_where(&mut sql, &mut params, self.filter.as_ref());
        if self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(&returning_list::<R>());
        }
        Ok((sql, params))
    }
}

impl<R: Record> BuildStatement for Update<'_, R> {
    fn build_statement(&self) -> Result<Statement> {
        Ok(finish(
            StatementKind::Update,
            R::TABLE,
            self.build()?,
            self.returning,
        ))
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// DELETE builder.
///
/// ```ignore
/// let stmt = Delete::<User>::new()
///     .filter(Expr::col("id").eq(7))
///     .build_statement()?;
/// ```
#[derive(Debug, Clone)]
pub struct Delete<R: Record> {
    filter: Option<Expr>,
    all_rows: bool,
    returning: bool,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> Default for Delete<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Delete<R> {
    pub fn new() -> Self {
        Self {
            filter: None,
            all_rows: false,
            returning: false,
            _marker: PhantomData,
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = and_filter(self.filter, expr);
        self
    }

    /// Allow the statement to delete every row of the table.
    pub fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }

    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Build the DELETE SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.filter.is_none() && !self.all_rows {
            return Err(Error::Custom(format!(
                "delete from {}: missing WHERE clause (use all_rows() to delete every row)",
                R::TABLE
            )));
        }
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", R::TABLE);
        push_where(&mut sql, &mut params, self.filter.as_ref());
        if self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(&returning_list::<R>());
        }
        Ok((sql, params))
    }
}

impl<R: Record> BuildStatement for Delete<R> {
    fn build_statement(&self) -> Result<Statement> {
        Ok(finish(
            StatementKind::Delete,
            R::TABLE,
            self.build()?,
            self.returning,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{FieldSpec, FromValue};

    #[derive(Debug, Default, Clone)]
    struct Product {
        id: i64,
        sku: String,
        price: f64,
    }

    static PRODUCT_FIELDS: [FieldSpec; 3] = [
        FieldSpec::new("id").select("id"),
        FieldSpec::new("sku").select("sku").write("sku"),
        FieldSpec::new("price").select("price").write("price"),
    ];

    impl Record for Product {
        const TABLE: &'static str = "products";

        fn fields() -> &'static [FieldSpec] {
            &PRODUCT_FIELDS
        }

        fn field_value(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(Value::from(self.id)),
                "sku" => Some(Value::from(&self.sku)),
                "price" => Some(Value::from(self.price)),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: &Value) -> Result<bool> {
            match field {
                "id" => self.id = FromValue::from_value(value, field)?,
                "sku" => self.sku = FromValue::from_value(value, field)?,
                "price" => self.price = FromValue::from_value(value, field)?,
                _ => return Ok(false),
            }
            Ok(true)
        }
    }

    fn widget() -> Product {
        Product {
            id: 1,
            sku: "W-1".into(),
            price: 9.5,
        }
    }

    #[test]
    fn test_select_uses_read_columns() {
        let stmt = Select::<Product>::new()
            .filter(Expr::col("price").gt(5.0))
            .order_by("id", Order::Desc)
            .page(Page::new(3, 10))
            .build_statement()
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT id, sku, price FROM products WHERE price > $1 ORDER BY id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params(), &[Value::Double(5.0)]);
        assert_eq!(stmt.kind(), StatementKind::Select);
        assert_eq!(stmt.table(), Some("products"));
    }

    #[test]
    fn test_select_custom_columns_and_relation() {
        let (sql, params) = Select::<Product>::new()
            .from("products p JOIN stock s ON s.sku = p.sku")
            .columns(&["p.sku", "s.qty"])
            .build()
            .unwrap();
        assert_eq!(sql, "SELECT p.sku, s.qty FROM products p JOIN stock s ON s.sku = p.sku");
        assert!(params.is_empty());
    }

    #[test]
    fn test_insert_writes_only_write_tagged_fields() {
        let product = widget();
        let stmt = Insert::new(&product).returning().build_statement().unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO products (sku, price) VALUES ($1, $2) RETURNING id, sku, price"
        );
        assert_eq!(
            stmt.params(),
            &[Value::Text("W-1".into()), Value::Double(9.5)]
        );
        assert!(stmt.yields_rows());
    }

    #[test]
    fn test_insert_on_conflict() {
        let product = widget();
        let (sql, _) = Insert::new(&product)
            .on_conflict_do_update(&["sku"], &[])
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO products (sku, price) VALUES ($1, $2) ON CONFLICT (sku) DO UPDATE SET price = EXCLUDED.price"
        );

        let (sql, _) = Insert::new(&product).on_conflict_do_nothing().build().unwrap();
        assert!(sql.ends_with("ON CONFLICT DO NOTHING"));
    }

    #[test]
    fn test_insert_many_numbers_placeholders_across_groups() {
        let products = vec![widget(), widget(), widget()];
        let stmt = InsertMany::new(&products).build_statement().unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO products (sku, price) VALUES ($1, $2), ($3, $4), ($5, $6)"
        );
        assert_eq!(stmt.params().len(), 6);
        assert!(!stmt.yields_rows());
    }

    #[test]
    fn test_insert_many_splits_at_parameter_limit() {
        let products = vec![widget(); 5];
        let builder = InsertMany::new(&products).max_params(4);
        assert!(builder.build().is_err());

        let stmts = builder.build_statements().unwrap();
        assert_eq!(stmts.len(), 3);
        assert_eq!(
            stmts[0].sql(),
            "INSERT INTO products (sku, price) VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(stmts[2].sql(), "INSERT INTO products (sku, price) VALUES ($1, $2)");
        let params: usize = stmts.iter().map(|s| s.params().len()).sum();
        assert_eq!(params, 10);
    }

    #[test]
    fn test_insert_many_default_limit_is_u16_max() {
        // 40_000 rows x 2 columns = 80_000 parameters.
        let products = vec![widget(); 40_000];
        let builder = InsertMany::new(&products);
        assert!(builder.build().is_err());

        let stmts = builder.build_statements().unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].params().len(), 65_534);
        assert_eq!(stmts[1].params().len(), 80_000 - 65_534);
        assert!(stmts.iter().all(|s| s.params().len() <= MAX_PARAMS));
    }

    #[test]
    fn test_insert_many_empty_is_an_error() {
        let products: Vec<Product> = Vec::new();
        assert!(InsertMany::new(&products).build_statement().is_err());
        assert!(InsertMany::new(&products).build_statements().is_err());
    }

    #[test]
    fn test_update_from_record_and_explicit_set() {
        let product = widget();
        let (sql, params) = Update::new(&product)
            .set("price", 12.0)
            .filter(Expr::col("id").eq(product.id))
            .build()
            .unwrap();
        assert_eq!(sql, "UPDATE products SET price = $1, sku = $2 WHERE id = $3");
        assert_eq!(
            params,
            vec![
                Value::Double(12.0),
                Value::Text("W-1".into()),
                Value::BigInt(1)
            ]
        );
    }

    #[test]
    fn test_update_set_only() {
        let product = widget();
        let (sql, _) = Update::new(&product)
            .set_only(&["sku"])
            .filter(Expr::col("id").eq(1_i64))
            .returning()
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE products SET sku = $1 WHERE id = $2 RETURNING id, sku, price"
        );
    }

    #[test]
    fn test_update_requires_predicate() {
        let err = Update::<Product>::empty()
            .set("price", 0.0)
            .build_statement()
            .unwrap_err();
        assert!(err.to_string().contains("missing WHERE"));

        let (sql, _) = Update::<Product>::empty()
            .set("price", 0.0)
            .all_rows()
            .build()
            .unwrap();
        assert_eq!(sql, "UPDATE products SET price = $1");
    }

    #[test]
    fn test_update_with_nothing_to_set() {
        let err = Update::<Product>::empty()
            .filter(Expr::col("id").eq(1_i64))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("nothing to set"));
    }

    #[test]
    fn test_delete() {
        let stmt = Delete::<Product>::new()
            .filter(Expr::col("sku").eq("W-1"))
            .build_statement()
            .unwrap();
        assert_eq!(stmt.sql(), "DELETE FROM products WHERE sku = $1");
        assert_eq!(stmt.kind(), StatementKind::Delete);
        assert!(Delete::<Product>::new().build_statement().is_err());
        assert_eq!(
            Delete::<Product>::new().all_rows().build().unwrap().0,
            "DELETE FROM products"
        );
    }
}

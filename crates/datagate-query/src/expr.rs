//! Predicates for `WHERE` clauses.
//!
//! Expressions render to PostgreSQL text with `$n` placeholders. Values are
//! always bound as parameters, never interpolated.
//!
//! ```ignore
//! let pred = Expr::col("role").eq("admin").and(Expr::col("age").gte(18));
//! ```

use datagate_core::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::ILike => "ILIKE",
        }
    }
}

/// A boolean SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: String,
        op: BinaryOp,
        value: Value,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    InList {
        column: String,
        values: Vec<Value>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// Column reference used to start an expression.
#[derive(Debug, Clone)]
pub struct Column(String);

impl Column {
    fn compare(self, op: BinaryOp, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Ge, value)
    }

    pub fn like(self, pattern: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::Like, pattern)
    }

    pub fn ilike(self, pattern: impl Into<Value>) -> Expr {
        self.compare(BinaryOp::ILike, pattern)
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            column: self.0,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            column: self.0,
            negated: true,
        }
    }

    /// `column IN (...)`. An empty list renders as `FALSE`.
    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::InList {
            column: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Expr {
    /// Start an expression on a column.
    pub fn col(name: impl Into<String>) -> Column {
        Column(name.into())
    }

    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        match self {
            Expr::And(mut parts) => {
                parts.push(other);
                Expr::And(parts)
            }
            first => Expr::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        match self {
            Expr::Or(mut parts) => {
                parts.push(other);
                Expr::Or(parts)
            }
            first => Expr::Or(vec![first, other]),
        }
    }

    #[must_use]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// Render into `sql`, appending bound values to `params`.
    ///
    /// Placeholders continue numbering from `params.len() + 1`.
    pub fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Expr::Compare { column, op, value } => {
                params.push(value.clone());
                sql.push_str(&format!("{} {} ${}", column, op.as_str(), params.len()));
            }
            Expr::IsNull { column, negated } => {
                sql.push_str(column);
                sql.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::InList { column, values } => {
                if values.is_empty() {
                    sql.push_str("FALSE");
                    return;
                }
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    params.push(value.clone());
                    placeholders.push(format!("${}", params.len()));
                }
                sql.push_str(&format!("{} IN ({})", column, placeholders.join(", ")));
            }
            Expr::And(parts) => render_group(parts, " AND ", "TRUE", sql, params),
            Expr::Or(parts) => render_group(parts, " OR ", "FALSE", sql, params),
            Expr::Not(inner) => {
                sql.push_str("NOT (");
                inner.render(sql, params);
                sql.push(')');
            }
        }
    }
}

fn render_group(
    parts: &[Expr],
    joiner: &str,
    empty: &str,
    sql: &mut String,
    params: &mut Vec<Value>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        part.render(sql, params);
    }
    sql.push(')');
}

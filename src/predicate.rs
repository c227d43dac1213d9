// 🧮 Predicate Expressions - Exclusion and join conditions as data
// Expressions are built once per adapter and rendered per backend dialect;
// literal values never get spliced into SQL by the adapters themselves

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// LITERALS & COLUMN REFERENCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

/// Column reference, optionally qualified by a table alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
    pub quoted: bool,
}

impl ColumnRef {
    /// Parse `name`, `alias.name`, `alias."quoted name"` or `"quoted name"`
    pub fn parse(spec: &str) -> Self {
        let (qualifier, rest) = match spec.split_once('.') {
            Some((q, rest)) if is_identifier(q) => (Some(q.to_string()), rest),
            _ => (None, spec),
        };
        let stripped = rest.trim_matches('"');
        let quoted = rest.starts_with('"') || !is_identifier(stripped);
        ColumnRef {
            qualifier,
            name: stripped.to_string(),
            quoted,
        }
    }

    fn render(&self) -> String {
        let name = if self.quoted {
            format!("\"{}\"", self.name.replace('"', "\"\""))
        } else {
            self.name.clone()
        };
        match &self.qualifier {
            Some(q) => format!("{}.{}", q, name),
            None => name,
        }
    }
}

/// Plain SQL identifier: letters, digits and underscores, not starting with a digit
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOp {
    fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        }
    }
}

// ============================================================================
// EXPRESSION TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Literal),
    /// Constant truth value (`TRUE` / `FALSE`)
    Const(bool),
    Lower(Box<Expr>),
    /// ISO-8601 UTC timestamp text truncated to a date
    ToDate(Box<Expr>),
    /// Whole days from the first operand to the second
    DaysBetween(Box<Expr>, Box<Expr>),
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        values: Vec<Literal>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn col(spec: &str) -> Expr {
        Expr::Column(ColumnRef::parse(spec))
    }

    pub fn text(value: &str) -> Expr {
        Expr::Literal(Literal::Text(value.to_string()))
    }

    pub fn int(value: i64) -> Expr {
        Expr::Literal(Literal::Int(value))
    }

    pub fn date(value: NaiveDate) -> Expr {
        Expr::Literal(Literal::Date(value))
    }

    pub fn bool(value: bool) -> Expr {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn lower(self) -> Expr {
        Expr::Lower(Box::new(self))
    }

    pub fn to_date(self) -> Expr {
        Expr::ToDate(Box::new(self))
    }

    pub fn days_until(self, other: Expr) -> Expr {
        Expr::DaysBetween(Box::new(self), Box::new(other))
    }

    pub fn compare(self, op: CmpOp, other: Expr) -> Expr {
        Expr::Cmp(Box::new(self), op, Box::new(other))
    }

    pub fn equals(self, other: Expr) -> Expr {
        self.compare(CmpOp::Eq, other)
    }

    pub fn not_equals(self, other: Expr) -> Expr {
        self.compare(CmpOp::NotEq, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        self.compare(CmpOp::GtEq, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        self.compare(CmpOp::LtEq, other)
    }

    pub fn like(self, pattern: &str) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.to_string(),
            negated: false,
        }
    }

    pub fn not_like(self, pattern: &str) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.to_string(),
            negated: true,
        }
    }

    pub fn in_list(self, values: Vec<Literal>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            values,
            negated: false,
        }
    }

    pub fn not_in_list(self, values: Vec<Literal>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            values,
            negated: true,
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn and(parts: Vec<Expr>) -> Expr {
        Expr::And(parts)
    }

    pub fn or(parts: Vec<Expr>) -> Expr {
        Expr::Or(parts)
    }

    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// Table aliases referenced anywhere in the expression
    pub fn qualifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_qualifiers(&mut out);
        out
    }

    fn collect_qualifiers(&self, out: &mut Vec<String>) {
        match self {
            Expr::Column(c) => {
                if let Some(q) = &c.qualifier {
                    if !out.contains(q) {
                        out.push(q.clone());
                    }
                }
            }
            Expr::Literal(_) | Expr::Const(_) => {}
            Expr::Lower(e) | Expr::ToDate(e) | Expr::Not(e) => e.collect_qualifiers(out),
            Expr::DaysBetween(a, b) | Expr::Cmp(a, _, b) => {
                a.collect_qualifiers(out);
                b.collect_qualifiers(out);
            }
            Expr::Like { expr, .. } | Expr::InList { expr, .. } | Expr::IsNull { expr, .. } => {
                expr.collect_qualifiers(out)
            }
            Expr::And(parts) | Expr::Or(parts) => {
                for p in parts {
                    p.collect_qualifiers(out);
                }
            }
        }
    }

    /// Render to SQL text for a dialect, pushing bound values onto `params`
    pub fn render(&self, dialect: &dyn Dialect, params: &mut Vec<Literal>) -> String {
        match self {
            Expr::Column(c) => c.render(),
            Expr::Literal(lit) => dialect.literal(lit, params),
            Expr::Const(true) => "TRUE".to_string(),
            Expr::Const(false) => "FALSE".to_string(),
            Expr::Lower(e) => format!("LOWER({})", e.render(dialect, params)),
            Expr::ToDate(e) => dialect.to_date(&e.render(dialect, params)),
            Expr::DaysBetween(a, b) => {
                let from = a.render(dialect, params);
                let to = b.render(dialect, params);
                dialect.days_between(&from, &to)
            }
            Expr::Cmp(a, op, b) => {
                let left = a.render(dialect, params);
                let right = b.render(dialect, params);
                format!("{} {} {}", left, op.as_sql(), right)
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let target = expr.render(dialect, params);
                let pat = dialect.literal(&Literal::Text(pattern.clone()), params);
                let op = if *negated { "NOT LIKE" } else { "LIKE" };
                format!("{} {} {}", target, op, pat)
            }
            Expr::InList {
                expr,
                values,
                negated,
            } => {
                // An empty list matches nothing (and NOT IN matches everything)
                if values.is_empty() {
                    return if *negated { "TRUE" } else { "FALSE" }.to_string();
                }
                let target = expr.render(dialect, params);
                let items: Vec<String> = values.iter().map(|v| dialect.literal(v, params)).collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", target, op, items.join(", "))
            }
            Expr::IsNull { expr, negated } => {
                let target = expr.render(dialect, params);
                let op = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", target, op)
            }
            Expr::And(parts) => join_parts(parts, " AND ", "TRUE", dialect, params),
            Expr::Or(parts) => join_parts(parts, " OR ", "FALSE", dialect, params),
            Expr::Not(e) => format!("NOT ({})", e.render(dialect, params)),
        }
    }
}

fn join_parts(
    parts: &[Expr],
    sep: &str,
    empty: &str,
    dialect: &dyn Dialect,
    params: &mut Vec<Literal>,
) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|p| format!("({})", p.render(dialect, params)))
        .collect();
    rendered.join(sep)
}

// ============================================================================
// DIALECTS
// ============================================================================

/// Backend-specific SQL rendering
pub trait Dialect {
    fn name(&self) -> &'static str;

    /// Render a literal, either inline or as a bound placeholder
    fn literal(&self, lit: &Literal, params: &mut Vec<Literal>) -> String;

    fn days_between(&self, from: &str, to: &str) -> String;

    fn to_date(&self, expr: &str) -> String;

    fn table_ref(&self, database: &str, schema: &str, table: &str) -> String;
}

/// Warehouse dialect; literals are inlined with quote escaping
pub struct SnowflakeDialect;

impl Dialect for SnowflakeDialect {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn literal(&self, lit: &Literal, _params: &mut Vec<Literal>) -> String {
        match lit {
            Literal::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Bool(true) => "TRUE".to_string(),
            Literal::Bool(false) => "FALSE".to_string(),
            Literal::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        }
    }

    fn days_between(&self, from: &str, to: &str) -> String {
        format!("DATEDIFF(day, {}, {})", from, to)
    }

    fn to_date(&self, expr: &str) -> String {
        format!("TO_DATE({}, 'YYYY-MM-DDTHH:MI:SSZ')", expr)
    }

    fn table_ref(&self, database: &str, schema: &str, table: &str) -> String {
        format!("{}.{}.{}", database, schema, table)
    }
}

/// Embedded dialect; values are bound as numbered `?N` parameters
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn literal(&self, lit: &Literal, params: &mut Vec<Literal>) -> String {
        match lit {
            Literal::Bool(true) => "TRUE".to_string(),
            Literal::Bool(false) => "FALSE".to_string(),
            other => {
                params.push(other.clone());
                format!("?{}", params.len())
            }
        }
    }

    fn days_between(&self, from: &str, to: &str) -> String {
        format!("CAST(julianday({}) - julianday({}) AS INTEGER)", to, from)
    }

    fn to_date(&self, expr: &str) -> String {
        format!("date({})", expr)
    }

    fn table_ref(&self, _database: &str, _schema: &str, table: &str) -> String {
        if is_identifier(table) {
            table.to_string()
        } else {
            format!("\"{}\"", table)
        }
    }
}

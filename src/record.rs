// 🧾 Records - Canonical rows flowing through the reconciliation pipeline
// A Record is an ordered column → value mapping; a RecordSet shares one schema

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

static NULL_VALUE: Value = Value::Null;

// ============================================================================
// VALUE
// ============================================================================

/// Cell value. Sources may deliver any of these; coercion happens after merge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form of the value, `None` for null
    ///
    /// Whole floats keep one decimal (`1042.0`) the way numeric warehouse
    /// columns surface; identity normalization strips it again.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Float(f) => Some(render_float(*f)),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Rendered value, or `""` for null (used for concatenated labels)
    pub fn render_or_empty(&self) -> String {
        self.render().unwrap_or_default()
    }

    /// Null or empty text; the "missing" notion used by field derivation
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Coerce to `Text`; null stays null
    pub fn to_text(&self) -> Value {
        match self.render() {
            Some(s) => Value::Text(s),
            None => Value::Null,
        }
    }

    /// Coerce to `Float`; unparsable text becomes null
    pub fn to_float(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Float(f) => Value::Float(*f),
            Value::Text(s) if s.trim().is_empty() => Value::Null,
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Null),
            Value::Date(_) => Value::Null,
        }
    }

    /// Coerce to `Date` using `YYYY-MM-DD`; a trailing time part is ignored
    pub fn to_date(&self) -> Value {
        match self {
            Value::Date(d) => Value::Date(*d),
            Value::Text(s) => parse_iso_date(s).map(Value::Date).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Parse `YYYY-MM-DD`, tolerating a `T...`/` ...` time suffix
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

// ============================================================================
// RECORD
// ============================================================================

/// One row: ordered canonical column names mapped to values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    /// Build from pairs; a repeated column keeps the last value
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Record::new();
        for (k, v) in pairs {
            record.set(&k.into(), v.into());
        }
        record
    }

    /// Builder: set a column
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value.into());
        self
    }

    /// Value of a column; missing columns read as null
    pub fn get(&self, column: &str) -> &Value {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
            .unwrap_or(&NULL_VALUE)
    }

    /// Replace the value of an existing column or append a new one
    pub fn set(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Number of null cells across the given columns (missing counts as null)
    pub fn null_count(&self, columns: &[String]) -> usize {
        columns.iter().filter(|c| self.get(c).is_null()).count()
    }

    /// Copy of this record reindexed to exactly `columns`
    pub fn project(&self, columns: &[String]) -> Record {
        Record {
            fields: columns
                .iter()
                .map(|c| (c.clone(), self.get(c).clone()))
                .collect(),
        }
    }
}

// ============================================================================
// RECORD SET
// ============================================================================

/// Ordered sequence of records sharing one ordered column schema
///
/// The schema is the union of every record's columns in first-seen order.
/// Records are stored reindexed to the schema, so cell counts line up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordSet {
    /// Empty set with a fixed schema
    pub fn new(columns: Vec<String>) -> Self {
        let mut set = RecordSet::default();
        for c in columns {
            set.add_column(&c);
        }
        set
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        let mut set = RecordSet::default();
        for r in records {
            set.push(r);
        }
        set
    }

    /// Append a record, widening the schema with any unseen columns
    pub fn push(&mut self, record: Record) {
        let before = self.columns.len();
        for c in record.columns() {
            if !self.columns.iter().any(|existing| existing == c) {
                self.columns.push(c.to_string());
            }
        }
        if self.columns.len() != before {
            let columns = self.columns.clone();
            for r in &mut self.records {
                *r = r.project(&columns);
            }
        }
        self.records.push(record.project(&self.columns));
    }

    /// Add a column (null for every existing record) if not present
    pub fn add_column(&mut self, column: &str) {
        if self.has_column(column) {
            return;
        }
        self.columns.push(column.to_string());
        for r in &mut self.records {
            r.set(column, Value::Null);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column in record order
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records.iter().map(move |r| r.get(column))
    }

    /// Rewrite one column in place through `f`; absent columns are left alone
    pub fn map_column<F>(&mut self, column: &str, f: F)
    where
        F: Fn(&Value) -> Value,
    {
        if !self.has_column(column) {
            return;
        }
        for r in &mut self.records {
            let next = f(r.get(column));
            r.set(column, next);
        }
    }

    /// Keep only records matching the predicate, schema unchanged
    pub fn filter<F>(&self, predicate: F) -> RecordSet
    where
        F: Fn(&Record) -> bool,
    {
        RecordSet {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Reindex every record to exactly `columns` (missing cells become null)
    pub fn project(&self, columns: &[String]) -> RecordSet {
        RecordSet {
            columns: columns.to_vec(),
            records: self.records.iter().map(|r| r.project(columns)).collect(),
        }
    }

    /// Vertical concatenation; schemas are unioned in order of appearance
    pub fn concat<I>(sets: I) -> RecordSet
    where
        I: IntoIterator<Item = RecordSet>,
    {
        let mut out = RecordSet::default();
        for set in sets {
            for c in &set.columns {
                out.add_column(c);
            }
            for r in set.records {
                out.push(r);
            }
        }
        out
    }

    /// Append all records of `other`
    pub fn extend(&mut self, other: RecordSet) {
        for c in &other.columns {
            self.add_column(c);
        }
        for r in other.records {
            self.push(r);
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ============================================================================
// TESTS
// ============================================================================

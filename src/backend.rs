// 🗄️ Extraction Backend - Runs compiled query plans
// The engine only sees `ExtractionBackend`; SQLite ships as the local implementation

use crate::error::BackendError;
use crate::predicate::{Literal, SqliteDialect};
use crate::query_plan::QueryPlan;
use crate::record::{Record, RecordSet, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::debug;

pub trait ExtractionBackend {
    /// Run one plan; rows come back keyed by the plan's output names
    fn execute(&self, plan: &QueryPlan) -> Result<RecordSet, BackendError>;
}

// ============================================================================
// SQLITE BACKEND
// ============================================================================

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        Ok(SqliteBackend {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        Ok(SqliteBackend {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteBackend { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn bind_value(literal: &Literal) -> SqlValue {
    match literal {
        Literal::Text(s) => SqlValue::Text(s.clone()),
        Literal::Int(i) => SqlValue::Integer(*i),
        Literal::Float(f) => SqlValue::Real(*f),
        Literal::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Literal::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
    }
}

/// Integers surface as floats, the way numeric warehouse columns do
fn read_value(column: &str, value: ValueRef<'_>) -> Result<Value, BackendError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Float(i as f64)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(BackendError::UnsupportedValue {
            column: column.to_string(),
            message: "binary values are not supported".to_string(),
        }),
    }
}

impl ExtractionBackend for SqliteBackend {
    fn execute(&self, plan: &QueryPlan) -> Result<RecordSet, BackendError> {
        let compiled = plan.compile(&SqliteDialect);
        debug!(
            adapter = plan.adapter(),
            fingerprint = %compiled.fingerprint(),
            sql = %compiled.sql,
            "Executing query plan"
        );

        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let bound: Vec<SqlValue> = compiled.params.iter().map(bind_value).collect();

        let mut set = RecordSet::new(columns.clone());
        let mut rows = stmt.query(params_from_iter(bound))?;
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, column) in columns.iter().enumerate() {
                record.set(column, read_value(column, row.get_ref(i)?)?);
            }
            set.push(record);
        }

        debug!(adapter = plan.adapter(), rows = set.len(), "Query plan returned");
        Ok(set)
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Database connection abstraction.
//!
//! Connections are owned by the caller. Statistics collectors borrow them
//! and may issue several queries concurrently through the same handle.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::MapResult;

/// A result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Anything that can run a SQL statement and return its rows.
#[async_trait]
pub trait DbConnection: Send + Sync {
    /// Run `sql` and return all rows.
    ///
    /// Failures are reported as `MapError::DatabaseQueryFailure`.
    async fn query(&self, sql: &str) -> MapResult<Vec<Row>>;

    /// Describe the result columns of `sql` without fetching rows.
    async fn columns(&self, sql: &str) -> MapResult<Vec<ColumnInfo>>;
}

/// A result column and its database type name (`int4`, `text`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Read an integer column from a row, accepting numeric and textual values
/// (PostgreSQL `numeric`/`bigint` may arrive as strings through JSON).
pub fn row_i64(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    }
}

/// Read a text column from a row.
pub fn row_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

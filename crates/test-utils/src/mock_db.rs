//! Scripted in-memory `DbConnection`.
//!
//! Responses are matched by SQL substring, first rule wins. A rule may
//! delay its answer, which is used to make queries complete in a different
//! order than they were issued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use map_common::{ColumnInfo, DbConnection, MapError, MapResult, Row};

/// Canned answer for a query.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(Vec<Row>),
    /// Result columns of a statement that returns no rows
    Columns(Vec<ColumnInfo>),
    Error(String),
}

impl MockResponse {
    /// Rows from a JSON array of objects.
    pub fn rows(value: Value) -> Self {
        let rows = value
            .as_array()
            .map(|rows| rows.iter().filter_map(|r| r.as_object().cloned()).collect())
            .unwrap_or_default();
        MockResponse::Rows(rows)
    }

    /// The single-row answer of a row count query.
    pub fn row_count(count: i64) -> Self {
        Self::rows(json!([{ "rows": count }]))
    }

    /// Columns from `(name, type)` pairs.
    pub fn columns(columns: &[(&str, &str)]) -> Self {
        MockResponse::Columns(
            columns
                .iter()
                .map(|(name, type_name)| ColumnInfo::new(*name, *type_name))
                .collect(),
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockResponse::Error(message.into())
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    response: MockResponse,
    delay: Duration,
}

/// In-memory connection answering from scripted rules.
#[derive(Debug)]
pub struct MockDbConnection {
    rules: Vec<Rule>,
    fallback: MockResponse,
    issued: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MockDbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDbConnection {
    /// Connection answering every query with `rows = 1`.
    pub fn new() -> Self {
        Self::with_fallback(MockResponse::row_count(1))
    }

    /// Connection failing every query not matched by a rule.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_fallback(MockResponse::error(message))
    }

    pub fn with_fallback(fallback: MockResponse) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
            issued: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer queries containing `pattern` with `response`.
    pub fn on(self, pattern: impl Into<String>, response: MockResponse) -> Self {
        self.on_delayed(pattern, response, Duration::ZERO)
    }

    /// Like [`MockDbConnection::on`], answering after `delay`.
    pub fn on_delayed(
        mut self,
        pattern: impl Into<String>,
        response: MockResponse,
        delay: Duration,
    ) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            response,
            delay,
        });
        self
    }

    /// Queries in the order they were issued.
    pub fn queries(&self) -> Vec<String> {
        self.issued.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Queries in the order they returned.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Most queries issued and not yet returned at any one time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn rule_for(&self, sql: &str) -> (MockResponse, Duration) {
        self.rules
            .iter()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| (rule.response.clone(), rule.delay))
            .unwrap_or_else(|| (self.fallback.clone(), Duration::ZERO))
    }
}

impl MockDbConnection {
    async fn respond(&self, sql: &str) -> MapResult<MockResponse> {
        if let Ok(mut issued) = self.issued.lock() {
            issued.push(sql.to_string());
        }
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let (response, delay) = self.rule_for(sql);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(sql.to_string());
        }

        match response {
            MockResponse::Error(message) => Err(MapError::DatabaseQueryFailure(message)),
            response => Ok(response),
        }
    }
}

/// Type name guessed from a JSON value.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(_) => "numeric",
        Value::String(_) => "text",
        _ => "unknown",
    }
}

#[async_trait]
impl DbConnection for MockDbConnection {
    async fn query(&self, sql: &str) -> MapResult<Vec<Row>> {
        match self.respond(sql).await? {
            MockResponse::Rows(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }

    /// Scripted columns, or the columns of the first scripted row.
    async fn columns(&self, sql: &str) -> MapResult<Vec<ColumnInfo>> {
        match self.respond(sql).await? {
            MockResponse::Columns(columns) => Ok(columns),
            MockResponse::Rows(rows) => Ok(rows
                .first()
                .map(|row| {
                    row.iter()
                        .map(|(name, value)| ColumnInfo::new(name.clone(), json_type_name(value)))
                        .collect()
                })
                .unwrap_or_default()),
            MockResponse::Error(_) => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_answer() {
        let db = MockDbConnection::new();
        let rows = db.query("select 1").await.unwrap();
        assert_eq!(rows[0]["rows"], json!(1));
        assert_eq!(db.queries(), vec!["select 1"]);
    }

    #[tokio::test]
    async fn test_first_rule_wins() {
        let db = MockDbConnection::failing("boom")
            .on("table_a", MockResponse::row_count(10))
            .on("table", MockResponse::row_count(20));

        let rows = db.query("select * from table_a").await.unwrap();
        assert_eq!(rows[0]["rows"], json!(10));

        let rows = db.query("select * from table_b").await.unwrap();
        assert_eq!(rows[0]["rows"], json!(20));

        let err = db.query("select 1").await.unwrap_err();
        assert!(matches!(err, MapError::DatabaseQueryFailure(ref m) if m == "boom"));
    }

    #[test]
    fn test_delayed_rule() {
        let db = MockDbConnection::new().on_delayed(
            "slow",
            MockResponse::row_count(3),
            Duration::from_millis(5),
        );
        let rows = tokio_test::block_on(db.query("select slow")).unwrap();
        assert_eq!(rows[0]["rows"], json!(3));
        assert_eq!(db.completed(), vec!["select slow"]);
        assert_eq!(db.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_columns() {
        let db = MockDbConnection::new()
            .on("LIMIT 0", MockResponse::columns(&[("name", "text"), ("pop", "int4")]))
            .on("from places", MockResponse::rows(json!([{"name": "a", "open": true}])));

        let columns = db.columns("select * from t LIMIT 0").await.unwrap();
        assert_eq!(columns[1], ColumnInfo::new("pop", "int4"));
        assert!(db.query("select * from t LIMIT 0").await.unwrap().is_empty());

        let columns = db.columns("select * from places").await.unwrap();
        assert_eq!(
            columns,
            vec![ColumnInfo::new("name", "text"), ColumnInfo::new("open", "bool")]
        );
    }
}

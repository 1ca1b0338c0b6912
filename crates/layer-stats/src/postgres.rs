//! PostgreSQL connection for statistics queries.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Column, Executor, PgPool, Statement, TypeInfo};
use tracing::instrument;

use map_common::{ColumnInfo, DbConnection, MapError, MapResult, Row};

/// Connection pool answering statistics queries.
///
/// Rows are fetched as JSON text so arbitrary statements can be decoded
/// without knowing their column types up front.
#[derive(Debug, Clone)]
pub struct PgDbConnection {
    pool: PgPool,
}

impl PgDbConnection {
    /// Create a new connection pool from a database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> MapResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| MapError::DatabaseQueryFailure(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }
}

/// Wrap a statement so every row comes back as one JSON text value.
fn json_rows_query(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';');
    format!(
        "SELECT row_to_json(__cdb_row)::text FROM ({}) AS __cdb_row",
        sql
    )
}

#[async_trait]
impl DbConnection for PgDbConnection {
    #[instrument(skip_all)]
    async fn query(&self, sql: &str) -> MapResult<Vec<Row>> {
        let wrapped = json_rows_query(sql);

        let rows: Vec<String> = sqlx::query_scalar(&wrapped)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MapError::DatabaseQueryFailure(format!("Query failed: {}", e)))?;

        rows.iter()
            .map(|text| {
                serde_json::from_str::<Row>(text).map_err(|e| {
                    MapError::DatabaseQueryFailure(format!("Invalid row payload: {}", e))
                })
            })
            .collect()
    }

    /// Column names and types come from the prepared statement, so the
    /// query is never executed.
    #[instrument(skip_all)]
    async fn columns(&self, sql: &str) -> MapResult<Vec<ColumnInfo>> {
        let statement = (&self.pool)
            .prepare(sql)
            .await
            .map_err(|e| MapError::DatabaseQueryFailure(format!("Describe failed: {}", e)))?;

        Ok(statement
            .columns()
            .iter()
            .map(|column| ColumnInfo::new(column.name(), column.type_info().name().to_lowercase()))
            .collect())
    }
}

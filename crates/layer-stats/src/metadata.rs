//! Column and sample statistics requested through layer metadata options.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::{try_join, try_join_all};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use map_common::connection::row_i64;
use map_common::{
    ColumnStatsOptions, DbConnection, LayerMetadataOptions, MapResult, Row, SampleOptions,
};

use crate::queries;

/// Column the sample is drawn on.
pub const SAMPLE_ID_COLUMN: &str = "cartodb_id";

/// Type and, with `columnStats`, summary values of one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(rename = "type")]
    pub column_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<Value>,

    /// `category`/`frequency` rows, most frequent first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Row>>,
}

impl ColumnStats {
    pub fn of_type(column_type: impl Into<String>) -> Self {
        Self {
            column_type: column_type.into(),
            ..Default::default()
        }
    }

    fn set(&mut self, function: &str, value: Option<Value>) {
        let slot = match function {
            "min" => &mut self.min,
            "max" => &mut self.max,
            "avg" => &mut self.avg,
            "sum" => &mut self.sum,
            _ => return,
        };
        *slot = value;
    }
}

/// Simplified type of a database column type name.
///
/// Array types (`_int4`, `int4[]`) get a `[]` suffix.
pub fn field_type(db_type: &str) -> String {
    let lower = db_type.to_lowercase();
    let (base, is_array) = match lower.strip_suffix("[]") {
        Some(base) => (base.to_string(), true),
        None => (lower.clone(), lower.starts_with('_')),
    };

    let simple = if base.contains("bool") {
        "boolean".to_string()
    } else if ["int", "float", "numeric"].iter().any(|t| base.contains(t)) {
        "number".to_string()
    } else if ["text", "char", "unknown"].iter().any(|t| base.contains(t)) {
        "string".to_string()
    } else if base.contains("date") || base.contains("time") {
        "date".to_string()
    } else {
        base.trim_start_matches('_').to_string()
    };

    if is_array {
        format!("{}[]", simple)
    } else {
        simple
    }
}

/// Aggregates computed for a simplified column type.
fn column_aggregations(column_type: &str) -> &'static [&'static str] {
    match column_type {
        "number" => &["min", "max", "avg", "sum"],
        "date" => &["min", "max"],
        _ => &[],
    }
}

/// Column names and simplified types of `sql`.
pub async fn columns(db: &dyn DbConnection, sql: &str) -> MapResult<BTreeMap<String, ColumnStats>> {
    let columns = db.columns(&queries::limited(sql, 0)).await?;
    Ok(columns
        .into_iter()
        .map(|c| (c.name, ColumnStats::of_type(field_type(&c.type_name))))
        .collect())
}

/// Fill in aggregates of numeric and date columns, and top categories of
/// string columns.
pub async fn column_stats(
    db: &dyn DbConnection,
    sql: &str,
    mut columns: BTreeMap<String, ColumnStats>,
    options: &ColumnStatsOptions,
) -> MapResult<BTreeMap<String, ColumnStats>> {
    let aggregates: Vec<String> = columns
        .iter()
        .flat_map(|(name, stats)| {
            column_aggregations(&stats.column_type).iter().map(move |function| {
                format!(
                    "{}({}) AS {}",
                    function,
                    queries::quote_ident(name),
                    queries::quote_ident(&format!("{}_{}", name, function))
                )
            })
        })
        .collect();

    let string_columns: Vec<String> = columns
        .iter()
        .filter(|(_, stats)| stats.column_type == "string")
        .map(|(name, _)| name.clone())
        .collect();

    debug!(
        aggregates = aggregates.len(),
        categorized = string_columns.len(),
        "Collecting column stats"
    );

    let aggregate_query = queries::column_aggregates(sql, &aggregates);
    let aggregate_rows = async {
        if aggregates.is_empty() {
            Ok(Vec::new())
        } else {
            db.query(&aggregate_query).await
        }
    };
    let category_queries: Vec<String> = string_columns
        .iter()
        .map(|name| {
            queries::top_categories(sql, name, options.top_categories(), options.include_nulls())
        })
        .collect();
    let categories = try_join_all(category_queries.iter().map(|query| db.query(query)));

    let (aggregate_rows, categories) = try_join(aggregate_rows, categories).await?;

    if let Some(row) = aggregate_rows.first() {
        for (name, stats) in columns.iter_mut() {
            for function in column_aggregations(&stats.column_type) {
                let value = row.get(&format!("{}_{}", name, function)).cloned();
                stats.set(function, value);
            }
        }
    }

    for (name, rows) in string_columns.iter().zip(categories) {
        if let Some(stats) = columns.get_mut(name) {
            stats.categories = Some(rows);
        }
    }

    Ok(columns)
}

/// Columns, with their stats when `columnStats` is requested.
pub async fn column_metadata(
    db: &dyn DbConnection,
    sql: &str,
    options: &LayerMetadataOptions,
) -> MapResult<Option<BTreeMap<String, ColumnStats>>> {
    if !options.needs_columns() {
        return Ok(None);
    }
    let columns = columns(db, sql).await?;
    match &options.column_stats {
        Some(stats_options) => column_stats(db, sql, columns, stats_options).await.map(Some),
        None => Ok(Some(columns)),
    }
}

/// Random rows of `sql`, picked by id within the id range.
pub async fn sample(db: &dyn DbConnection, sql: &str, options: &SampleOptions) -> MapResult<Vec<Row>> {
    let rows = db
        .query(&queries::max_min_span(sql, SAMPLE_ID_COLUMN))
        .await?;
    let (min, span) = match rows.first() {
        Some(row) => (row_i64(row, "min_id"), row_i64(row, "id_span")),
        None => (None, None),
    };

    let (min, span) = match (min, span) {
        (Some(min), Some(span)) if span > 0 => (min, span),
        _ => return Ok(Vec::new()),
    };

    let ids = sample_ids(min, span, options.num_rows(), &mut rand::thread_rng());
    db.query(&queries::sample_from_ids(
        sql,
        &ids,
        options.include_columns.as_deref(),
        SAMPLE_ID_COLUMN,
    ))
    .await
}

/// Up to `limit` distinct ids in `[min, min + span)`, sorted.
pub fn sample_ids<R: Rng + ?Sized>(min: i64, span: i64, limit: u64, rng: &mut R) -> Vec<i64> {
    if span <= 0 {
        return Vec::new();
    }
    let limit = limit.min(span as u64) as usize;
    let mut ids = BTreeSet::new();
    while ids.len() < limit {
        ids.insert(min + rng.gen_range(0..span));
    }
    ids.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[test]
    fn test_field_type() {
        assert_eq!(field_type("INT4"), "number");
        assert_eq!(field_type("float8"), "number");
        assert_eq!(field_type("NUMERIC"), "number");
        assert_eq!(field_type("text"), "string");
        assert_eq!(field_type("VARCHAR"), "string");
        assert_eq!(field_type("bool"), "boolean");
        assert_eq!(field_type("TIMESTAMPTZ"), "date");
        assert_eq!(field_type("date"), "date");
        assert_eq!(field_type("geometry"), "geometry");
        assert_eq!(field_type("_int4"), "number[]");
        assert_eq!(field_type("TEXT[]"), "string[]");
    }

    #[test]
    fn test_sample_ids_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let ids = sample_ids(10, 1000, 25, &mut rng);
        assert_eq!(ids.len(), 25);
        assert!(ids.iter().all(|id| (10..1010).contains(id)));
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sample_ids_small_span() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_ids(5, 3, 100, &mut rng), vec![5, 6, 7]);
        assert!(sample_ids(5, 0, 100, &mut rng).is_empty());
    }

    #[test]
    fn test_column_stats_serialization() {
        let mut stats = ColumnStats::of_type("number");
        stats.set("min", Some(json!(1)));
        stats.set("max", Some(json!(9)));
        stats.set("median", Some(json!(5)));
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            json!({"type": "number", "min": 1, "max": 9})
        );
    }
}

//! SQL used to compute layer statistics.
//!
//! Collectors resolve renderer tokens for a zoom level before building these
//! statements. Any token left is replaced with a dummy value so the
//! statements run outside of a tile request.

use map_common::tokens::substitute_dummy_tokens;

/// Geometry column read for the layer geometry type.
pub const GEOMETRY_COLUMN: &str = "the_geom_webmercator";

/// Planner-based row estimate, returned in a `rows` column.
pub fn row_estimation(query: &str) -> String {
    format!(
        "select CDB_EstimateRowCount($windshaft${}$windshaft$) as rows",
        substitute_dummy_tokens(query)
    )
}

/// Exact row count, returned in a `rows` column.
pub fn actual_row_count(query: &str) -> String {
    format!(
        "select COUNT(*) AS rows FROM ({}) AS __cdb_query",
        substitute_dummy_tokens(query)
    )
}

/// Geometry type of the first non-null geometry, in a `geom_type` column.
pub fn geometry_type(query: &str, geometry_column: &str) -> String {
    format!(
        "SELECT ST_GeometryType({column}) AS geom_type \
         FROM ({query}) AS __cdb_query \
         WHERE {column} IS NOT NULL \
         LIMIT 1",
        column = geometry_column,
        query = substitute_dummy_tokens(query)
    )
}

/// Rows of `query` capped at `limit`; `0` only describes the columns.
pub fn limited(query: &str, limit: u64) -> String {
    format!(
        "SELECT * FROM ({}) AS __cdb_query LIMIT {}",
        substitute_dummy_tokens(query),
        limit
    )
}

/// Aggregate expressions (`min("pop") AS "pop_min"`) over the whole query.
pub fn column_aggregates(query: &str, aggregates: &[String]) -> String {
    format!(
        "SELECT {} FROM ({}) AS __cdb_query",
        aggregates.join(", "),
        substitute_dummy_tokens(query)
    )
}

/// Most frequent values of `column`, as `category`/`frequency` rows.
pub fn top_categories(query: &str, column: &str, top_n: u32, include_nulls: bool) -> String {
    let column = quote_ident(column);
    let filter = if include_nulls {
        String::new()
    } else {
        format!(" WHERE {} IS NOT NULL", column)
    };
    format!(
        "SELECT {column} AS category, COUNT(*) AS frequency \
         FROM ({query}) AS __cdb_query{filter} \
         GROUP BY {column} ORDER BY 2 DESC \
         LIMIT {top_n}",
        column = column,
        query = substitute_dummy_tokens(query),
        filter = filter,
        top_n = top_n
    )
}

/// Lowest id and id span of `column`, in `min_id`/`id_span` columns.
pub fn max_min_span(query: &str, column: &str) -> String {
    format!(
        "SELECT min({column}) AS min_id, max({column}) AS max_id, \
         (max({column}) - min({column})) AS id_span \
         FROM ({query}) AS _cdb_metadata_max_min_span",
        column = quote_ident(column),
        query = substitute_dummy_tokens(query)
    )
}

/// Rows whose `column` is one of `ids`, restricted to `columns` when given.
pub fn sample_from_ids(query: &str, ids: &[i64], columns: Option<&[String]>, column: &str) -> String {
    let selected = match columns {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|name| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "*".to_string(),
    };
    let ids = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!(
        "SELECT {} FROM ({}) AS _cdb_metadata_sample WHERE {} IN ({})",
        selected,
        substitute_dummy_tokens(query),
        quote_ident(column),
        ids
    )
}

/// Double-quoted SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::tokens::substitute_tokens_for_zoom;

    #[test]
    fn test_row_estimation() {
        assert_eq!(
            row_estimation("select * from test_table"),
            "select CDB_EstimateRowCount($windshaft$select * from test_table$windshaft$) as rows"
        );
    }

    #[test]
    fn test_leftover_tokens_are_replaced() {
        let sql = row_estimation("select * from t where the_geom_webmercator && !bbox!");
        assert!(sql.contains("ST_MakeEnvelope(0,0,0,0)"));
        assert!(!sql.contains("!bbox!"));

        let sql = actual_row_count("select * from t where z = !scale_denominator!");
        assert_eq!(
            sql,
            "select COUNT(*) AS rows FROM (select * from t where z = 0) AS __cdb_query"
        );
    }

    #[test]
    fn test_zoom_tokens_resolved_first() {
        let layer_sql = "select * from t where the_geom_webmercator && !bbox!";
        let sql = row_estimation(&substitute_tokens_for_zoom(layer_sql, 0, false));
        assert!(sql.contains("ST_MakeEnvelope(-20037508.34"));
        assert!(!sql.contains("ST_MakeEnvelope(0,0,0,0)"));
    }

    #[test]
    fn test_geometry_type() {
        let sql = geometry_type("select * from t", GEOMETRY_COLUMN);
        assert!(sql.starts_with("SELECT ST_GeometryType(the_geom_webmercator) AS geom_type"));
        assert!(sql.contains("WHERE the_geom_webmercator IS NOT NULL LIMIT 1"));
    }

    #[test]
    fn test_limited() {
        assert_eq!(
            limited("select * from t", 0),
            "SELECT * FROM (select * from t) AS __cdb_query LIMIT 0"
        );
    }

    #[test]
    fn test_top_categories() {
        let sql = top_categories("select * from t", "adm0name", 5, false);
        assert!(sql.starts_with("SELECT \"adm0name\" AS category, COUNT(*) AS frequency"));
        assert!(sql.contains("WHERE \"adm0name\" IS NOT NULL"));
        assert!(sql.ends_with("GROUP BY \"adm0name\" ORDER BY 2 DESC LIMIT 5"));

        let sql = top_categories("select * from t", "adm0name", 5, true);
        assert!(!sql.contains("IS NOT NULL"));
    }

    #[test]
    fn test_sample_from_ids() {
        let sql = sample_from_ids("select * from t", &[3, 7], None, "cartodb_id");
        assert_eq!(
            sql,
            "SELECT * FROM (select * from t) AS _cdb_metadata_sample WHERE \"cartodb_id\" IN (3,7)"
        );

        let columns = vec!["name".to_string(), "pop".to_string()];
        let sql = sample_from_ids("select * from t", &[1], Some(columns.as_slice()), "cartodb_id");
        assert!(sql.starts_with("SELECT \"name\", \"pop\" FROM"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("pop_max"), "\"pop_max\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}

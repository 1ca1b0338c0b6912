//! Aggregation for vector-only (MVT) maps.
//!
//! Vector tiles are always binned on the canonical zoom grid and the bin
//! center is computed from the grid indices; the request's placement is
//! ignored. Caller columns are aggregated per bin next to the feature count.

use map_common::MapResult;
use tracing::debug;

use crate::columns::{aggregate_column_defs, aggregate_column_names};
use crate::request::RenderAggregationRequest;

/// Size of one pixel at the zoom being rendered, divided by the tile size.
/// `resolution` times this is the cell size in map units.
const CANONICAL_GRID_UNIT: &str = "(CDB_XYZ_Resolution(CDB_ZoomFromScale(!scale_denominator!))/256)";

#[derive(Debug, Clone)]
pub struct VectorGridAggregator {
    request: RenderAggregationRequest,
}

impl VectorGridAggregator {
    pub fn new(request: RenderAggregationRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &RenderAggregationRequest {
        &self.request
    }

    pub fn sql(&self) -> MapResult<String> {
        let column_defs = aggregate_column_defs(&self.request.columns)?;
        let column_names = aggregate_column_names(&self.request.columns, None);

        debug!(
            resolution = self.request.resolution,
            columns = column_names.len(),
            "Building vector aggregation query"
        );

        Ok(format!(
            "WITH _cdb_source AS (
  {source}
),
_cdb_params AS (
  SELECT ({resolution}*{unit})::double precision AS cell
),
_cdb_bins AS (
  SELECT
    Floor(ST_X(_cdb_source.the_geom_webmercator)/_cdb_params.cell)::bigint AS _cdb_gx,
    Floor(ST_Y(_cdb_source.the_geom_webmercator)/_cdb_params.cell)::bigint AS _cdb_gy,
    {columns}
  FROM _cdb_source, _cdb_params
  GROUP BY _cdb_gx, _cdb_gy
),
_cdb_centers AS (
  SELECT
    _cdb_bins.*,
    ST_SetSRID(
      ST_MakePoint((_cdb_gx + 0.5)*_cdb_params.cell, (_cdb_gy + 0.5)*_cdb_params.cell), 3857
    ) AS the_geom_webmercator
  FROM _cdb_bins, _cdb_params
)
SELECT
  row_number() over() AS cartodb_id,
  ST_Transform(the_geom_webmercator, 4326) AS the_geom,
  the_geom_webmercator,
  {names}
FROM _cdb_centers",
            source = self.request.source_query,
            resolution = self.request.resolution,
            unit = CANONICAL_GRID_UNIT,
            columns = column_defs.join(",\n    "),
            names = column_names.join(",\n  "),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::AggregateSpec;

    #[test]
    fn test_canonical_cell() {
        let request = RenderAggregationRequest::new("select * from t").with_resolution(4.0);
        let sql = VectorGridAggregator::new(request).sql().unwrap();
        assert!(sql.contains(
            "(4*(CDB_XYZ_Resolution(CDB_ZoomFromScale(!scale_denominator!))/256))::double precision AS cell"
        ));
        assert!(sql.contains("(_cdb_gx + 0.5)*_cdb_params.cell, (_cdb_gy + 0.5)*_cdb_params.cell"));
    }

    #[test]
    fn test_source_query_unchanged() {
        let source = "select cartodb_id, the_geom_webmercator from t where !bbox! && the_geom_webmercator";
        let sql = VectorGridAggregator::new(RenderAggregationRequest::new(source))
            .sql()
            .unwrap();
        assert!(sql.starts_with(&format!("WITH _cdb_source AS (\n  {}\n)", source)));
    }

    #[test]
    fn test_placement_is_ignored() {
        let centroid = VectorGridAggregator::new(RenderAggregationRequest::new("select 1"))
            .sql()
            .unwrap();
        let sample = VectorGridAggregator::new(
            RenderAggregationRequest::new("select 1").with_placement("point-sample"),
        )
        .sql()
        .unwrap();
        assert_eq!(centroid, sample);
    }

    #[test]
    fn test_emits_both_geometries_and_count() {
        let sql = VectorGridAggregator::new(RenderAggregationRequest::new("select 1"))
            .sql()
            .unwrap();
        assert!(sql.contains("ST_Transform(the_geom_webmercator, 4326) AS the_geom"));
        assert!(sql.contains("count(*) AS _cdb_feature_count"));
        assert!(sql.ends_with("_cdb_feature_count\nFROM _cdb_centers"));
    }

    #[test]
    fn test_extra_columns_are_aggregated_per_bin() {
        let request = RenderAggregationRequest::new("select 1")
            .with_column("price_avg", AggregateSpec::function("avg", "price"));
        let sql = VectorGridAggregator::new(request).sql().unwrap();
        assert!(sql.contains("avg(price) AS price_avg"));
        assert!(sql.contains("_cdb_feature_count,\n  price_avg\nFROM _cdb_centers"));
    }

    #[test]
    fn test_bin_indices_are_bigint() {
        // Fine resolutions give bin indices beyond the int4 range
        let request = RenderAggregationRequest::new("select 1").with_resolution(0.001);
        let sql = VectorGridAggregator::new(request).sql().unwrap();
        assert!(sql.contains("::bigint AS _cdb_gx"));
        assert!(sql.contains("::bigint AS _cdb_gy"));
        assert!(!sql.contains("::int AS"));
    }
}

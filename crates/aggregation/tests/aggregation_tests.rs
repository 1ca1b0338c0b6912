//! Tests for aggregation SQL generation through the public API.

use std::collections::BTreeMap;

use aggregation::{
    template_for, AggregationSelector, GridAggregator, RenderAggregationRequest, TemplateContext,
    DEFAULT_THRESHOLD,
};
use map_common::{AggregateSpec, GeometryKind, MapError};
use test_utils::{assert_sql_contains, fixtures};

// ============================================================================
// Column definitions
// ============================================================================

#[test]
fn test_expression_wins_over_function_pair() {
    let spec = AggregateSpec {
        aggregate_expression: Some("max(pop_max) - min(pop_min)".to_string()),
        aggregate_function: Some("sum".to_string()),
        aggregated_column: Some("pop_max".to_string()),
    };
    let request = RenderAggregationRequest::new(fixtures::POINTS_SQL).with_column("pop_range", spec);
    let sql = AggregationSelector::new(&fixtures::raster_map(), request)
        .unwrap()
        .sql()
        .unwrap();

    assert_sql_contains!(sql, "max(pop_max) - min(pop_min) AS pop_range");
    assert!(!sql.contains("sum(pop_max)"));
}

#[test]
fn test_empty_columns_emit_only_feature_count() {
    let columns = BTreeMap::new();
    for placement in ["centroid", "point-grid", "point-sample"] {
        let sql = template_for(placement).unwrap()(&TemplateContext {
            source_query: "SELECT 1",
            resolution: 256.0,
            columns: &columns,
        })
        .unwrap();

        assert_eq!(sql.matches(" AS _cdb_feature_count").count(), 1, "{}", placement);
        assert_eq!(sql.matches("count(*)").count(), 1, "{}", placement);
    }
}

// ============================================================================
// Placement templates
// ============================================================================

#[test]
fn test_centroid_template_shape() {
    let columns = BTreeMap::new();
    let sql = template_for("centroid").unwrap()(&TemplateContext {
        source_query: "SELECT 1",
        resolution: 256.0,
        columns: &columns,
    })
    .unwrap();

    let group_by = sql.split("GROUP BY").nth(1).expect("GROUP BY clause");
    assert_eq!(group_by.matches("Floor(").count(), 2);
    assert_sql_contains!(sql, "AVG(ST_X(");
    assert_sql_contains!(sql, "AVG(ST_Y(");
    assert_sql_contains!(sql, "_cdb_query.the_geom_webmercator && _cdb_params.bbox");
}

#[test]
fn test_bogus_placement() {
    assert!(matches!(
        template_for("bogus"),
        Err(MapError::InvalidAggregationPlacement(ref p)) if p == "bogus"
    ));

    let request = RenderAggregationRequest::new("SELECT 1").with_placement("bogus");
    assert!(matches!(
        AggregationSelector::new(&fixtures::raster_map(), request),
        Err(MapError::InvalidAggregationPlacement(_))
    ));
}

// ============================================================================
// Strategy selection
// ============================================================================

#[test]
fn test_vector_only_map_selects_vector() {
    let selector =
        AggregationSelector::new(&fixtures::vector_map(), RenderAggregationRequest::new("SELECT 1"))
            .unwrap();
    assert!(matches!(selector.aggregator(), GridAggregator::Vector(_)));
    assert_eq!(selector.aggregator().geometry_kind(), GeometryKind::VectorOnly);
    assert_sql_contains!(selector.sql().unwrap(), "CDB_XYZ_Resolution(CDB_ZoomFromScale(!scale_denominator!))");
}

#[test]
fn test_styled_map_selects_raster() {
    for map in [fixtures::raster_map(), fixtures::mixed_map()] {
        let selector =
            AggregationSelector::new(&map, RenderAggregationRequest::new("SELECT 1")).unwrap();
        assert!(matches!(selector.aggregator(), GridAggregator::Raster(_)));
    }
}

#[test]
fn test_defaults_generate_centroid_sql() {
    let request = RenderAggregationRequest::new(fixtures::POINTS_SQL);
    assert_eq!(request.threshold, DEFAULT_THRESHOLD);

    let sql = AggregationSelector::new(&fixtures::raster_map(), request)
        .unwrap()
        .sql()
        .unwrap();

    assert_sql_contains!(sql, "0.00028/256");
    assert_sql_contains!(sql, "(256*0.00028/256*!scale_denominator!)");
    assert_sql_contains!(sql, "!bbox!");
    assert_sql_contains!(sql, "AVG(ST_X(");
}

#[test]
fn test_selector_for_layer_uses_layer_options() {
    let mut map = fixtures::raster_map();
    map.layers[0].options.placement = Some("point-grid".to_string());
    map.layers[0].options.resolution = Some(32.0);

    let sql = AggregationSelector::for_layer(&map, 0).unwrap().sql().unwrap();
    assert_sql_contains!(sql, "(32*0.00028/256*!scale_denominator!)");
    assert_sql_contains!(sql, "_cdb_gx*(res+0.5), _cdb_gy*(res*0.5)");
}

#[test]
fn test_threshold_does_not_change_sql() {
    let map = fixtures::raster_map();
    let low = AggregationSelector::new(&map, RenderAggregationRequest::new("SELECT 1").with_threshold(1))
        .unwrap()
        .sql()
        .unwrap();
    let high = AggregationSelector::new(&map, RenderAggregationRequest::new("SELECT 1"))
        .unwrap()
        .sql()
        .unwrap();
    assert_eq!(low, high);
}

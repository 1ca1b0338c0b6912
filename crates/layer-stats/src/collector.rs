//! Statistics collectors, one per family of layer types.

use std::collections::BTreeMap;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use map_common::connection::{row_i64, row_str};
use map_common::tokens::substitute_tokens_for_zoom;
use map_common::{DbConnection, Layer, LayerType, MapResult, Row};

use crate::metadata::{self, ColumnStats};
use crate::queries;

/// Feature count reported when the estimate query fails.
pub const UNDETERMINED_FEATURE_COUNT: i64 = -1;

/// Statistics of one layer, as exposed in the layer's `meta.stats`.
///
/// Collectors with nothing to report return the default value, which
/// serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_feature_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<i64>,

    /// Exact count of the query at the `aggrFeatureCount` zoom
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggr_feature_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<BTreeMap<String, ColumnStats>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<Row>>,
}

impl LayerStats {
    pub fn estimated(count: i64) -> Self {
        Self {
            estimated_feature_count: Some(count),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &LayerStats::default()
    }
}

/// Estimates the number of features of a SQL layer from its row count.
///
/// One row is assumed to render as one feature.
#[derive(Debug, Clone)]
pub struct RowCountEstimator {
    types: Vec<LayerType>,
}

impl Default for RowCountEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowCountEstimator {
    pub fn new() -> Self {
        Self {
            types: vec![LayerType::Mapnik, LayerType::Cartodb],
        }
    }

    pub fn can_handle(&self, layer_type: &LayerType) -> bool {
        self.types.contains(layer_type)
    }

    /// A failing estimate degrades to [`UNDETERMINED_FEATURE_COUNT`] so one
    /// bad layer does not fail the whole map. The optional metadata queries
    /// propagate their errors.
    ///
    /// Zoom tokens resolve to zoom 0, so bbox filters cover the whole world.
    #[instrument(skip_all, fields(layer_type = %layer.layer_type))]
    pub async fn collect(&self, layer: &Layer, db: &dyn DbConnection) -> MapResult<LayerStats> {
        let options = &layer.options;
        let requested = options.metadata.clone().unwrap_or_default();

        let estimate_sql = substitute_tokens_for_zoom(&options.sql, 0, false);
        let raw_sql = substitute_tokens_for_zoom(options.raw_sql(), 0, false);
        let aggr_sql = requested
            .aggr_feature_count
            .map(|zoom| substitute_tokens_for_zoom(&options.sql, zoom, false));

        let feature_count = async {
            if requested.feature_count {
                exact_count(db, &raw_sql).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let aggr_feature_count = async {
            match &aggr_sql {
                Some(sql) => exact_count(db, sql).await.map(Some),
                None => Ok(None),
            }
        };
        let geometry_type = async {
            if requested.geometry_type {
                first_geometry_type(db, &raw_sql).await
            } else {
                Ok(None)
            }
        };
        let sample = async {
            match &requested.sample {
                Some(sample_options) => metadata::sample(db, &raw_sql, sample_options)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };

        let (estimated_feature_count, feature_count, aggr_feature_count, geometry_type, sample, columns) =
            futures::join!(
                estimate_rows(db, &estimate_sql),
                feature_count,
                aggr_feature_count,
                geometry_type,
                sample,
                metadata::column_metadata(db, &raw_sql, &requested)
            );

        let stats = LayerStats {
            estimated_feature_count: Some(estimated_feature_count),
            feature_count: feature_count?,
            aggr_feature_count: aggr_feature_count?,
            geometry_type: geometry_type?,
            columns: columns?,
            sample: sample?,
        };
        debug!(estimated = estimated_feature_count, "Collected layer stats");
        Ok(stats)
    }
}

async fn estimate_rows(db: &dyn DbConnection, sql: &str) -> i64 {
    match db.query(&queries::row_estimation(sql)).await {
        Ok(rows) => rows
            .first()
            .and_then(|row| row_i64(row, "rows"))
            .unwrap_or(UNDETERMINED_FEATURE_COUNT),
        Err(e) => {
            warn!(error = %e, "Row estimation failed");
            counter!("layer_stats_estimation_failures_total").increment(1);
            UNDETERMINED_FEATURE_COUNT
        }
    }
}

async fn exact_count(db: &dyn DbConnection, sql: &str) -> MapResult<i64> {
    let rows = db.query(&queries::actual_row_count(sql)).await?;
    Ok(rows
        .first()
        .and_then(|row| row_i64(row, "rows"))
        .unwrap_or(UNDETERMINED_FEATURE_COUNT))
}

async fn first_geometry_type(db: &dyn DbConnection, sql: &str) -> MapResult<Option<String>> {
    let rows = db
        .query(&queries::geometry_type(sql, queries::GEOMETRY_COLUMN))
        .await?;
    Ok(rows
        .first()
        .and_then(|row| row_str(row, "geom_type"))
        .map(str::to_string))
}

/// Collector for layer types without statistics.
#[derive(Debug, Clone)]
pub struct NullStatsCollector {
    types: Vec<LayerType>,
}

impl Default for NullStatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl NullStatsCollector {
    pub fn new() -> Self {
        Self {
            types: vec![LayerType::Torque],
        }
    }

    pub fn can_handle(&self, layer_type: &LayerType) -> bool {
        self.types.contains(layer_type)
    }
}

/// Absorbs an explicit set of layer types with empty statistics.
#[derive(Debug, Clone)]
pub struct FallbackStatsCollector {
    types: Vec<LayerType>,
}

impl FallbackStatsCollector {
    pub fn new(types: impl IntoIterator<Item = LayerType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    pub fn can_handle(&self, layer_type: &LayerType) -> bool {
        self.types.contains(layer_type)
    }
}

/// A statistics collector.
#[derive(Debug, Clone)]
pub enum LayerTypeCollector {
    RowCountEstimator(RowCountEstimator),
    Null(NullStatsCollector),
    Fallback(FallbackStatsCollector),
}

impl LayerTypeCollector {
    pub fn name(&self) -> &'static str {
        match self {
            LayerTypeCollector::RowCountEstimator(_) => "row-count-estimator",
            LayerTypeCollector::Null(_) => "null",
            LayerTypeCollector::Fallback(_) => "fallback",
        }
    }

    pub fn can_handle(&self, layer_type: &LayerType) -> bool {
        match self {
            LayerTypeCollector::RowCountEstimator(c) => c.can_handle(layer_type),
            LayerTypeCollector::Null(c) => c.can_handle(layer_type),
            LayerTypeCollector::Fallback(c) => c.can_handle(layer_type),
        }
    }

    pub async fn collect(&self, layer: &Layer, db: &dyn DbConnection) -> MapResult<LayerStats> {
        match self {
            LayerTypeCollector::RowCountEstimator(c) => c.collect(layer, db).await,
            LayerTypeCollector::Null(_) | LayerTypeCollector::Fallback(_) => {
                Ok(LayerStats::default())
            }
        }
    }
}

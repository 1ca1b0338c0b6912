//! JSON report emitted for a map config.

use serde::Serialize;

use aggregation::{AggregationSelector, GridAggregator};
use layer_stats::LayerStats;
use map_common::{tokens, LayerType, MapConfig, MapResult};

/// Report shaped like the layergroup metadata of a map.
#[derive(Debug, Serialize)]
pub struct MapReport {
    pub metadata: MapMetadata,
}

#[derive(Debug, Serialize)]
pub struct MapMetadata {
    pub layers: Vec<LayerReport>,
}

#[derive(Debug, Serialize)]
pub struct LayerReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub layer_type: String,

    pub meta: LayerMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationReport>,
}

#[derive(Debug, Default, Serialize)]
pub struct LayerMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<LayerStats>,
}

/// Aggregation query generated for one layer.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub strategy: &'static str,
    pub placement: String,
    pub resolution: f64,
    pub sql: String,
}

/// Aggregation SQL for the layer at `index`.
///
/// Only mapnik and cartodb layers are aggregated. With a zoom level the
/// substitution tokens are replaced for that zoom, otherwise they are
/// left in place for the renderer.
pub fn aggregation_for(
    map_config: &dyn MapConfig,
    index: usize,
    zoom: Option<u32>,
) -> MapResult<Option<AggregationReport>> {
    match map_config.layer_type(index) {
        Some(LayerType::Mapnik) | Some(LayerType::Cartodb) => {}
        _ => return Ok(None),
    }

    let selector = AggregationSelector::for_layer(map_config, index)?;
    let aggregator = selector.aggregator();
    let request = aggregator.request();

    let sql = selector.sql()?;
    let sql = match zoom {
        Some(z) => tokens::substitute_tokens_for_zoom(&sql, z, false),
        None => sql,
    };

    Ok(Some(AggregationReport {
        strategy: match aggregator {
            GridAggregator::Vector(_) => "vector",
            GridAggregator::Raster(_) => "raster",
        },
        placement: request.placement.clone(),
        resolution: request.resolution,
        sql,
    }))
}

/// Assemble the report from per-layer aggregation and statistics results.
pub fn build_report(
    map_config: &dyn MapConfig,
    aggregations: Vec<Option<AggregationReport>>,
    stats: Option<Vec<LayerStats>>,
) -> MapReport {
    let mut aggregations = aggregations.into_iter();
    let mut stats = stats.map(Vec::into_iter);

    let layers = map_config
        .layers()
        .iter()
        .map(|layer| LayerReport {
            id: layer.id.clone(),
            layer_type: layer.layer_type.to_string(),
            meta: LayerMeta {
                stats: stats.as_mut().and_then(Iterator::next),
            },
            aggregation: aggregations.next().flatten(),
        })
        .collect();

    MapReport {
        metadata: MapMetadata { layers },
    }
}

//! Strategy selection from the map config.

use map_common::{GeometryKind, MapConfig, MapError, MapResult};
use tracing::debug;

use crate::raster::RasterGridAggregator;
use crate::request::RenderAggregationRequest;
use crate::vector::VectorGridAggregator;

/// The aggregation strategy chosen for a layer.
#[derive(Debug, Clone)]
pub enum GridAggregator {
    Vector(VectorGridAggregator),
    Raster(RasterGridAggregator),
}

impl GridAggregator {
    pub fn sql(&self) -> MapResult<String> {
        match self {
            GridAggregator::Vector(aggregator) => aggregator.sql(),
            GridAggregator::Raster(aggregator) => aggregator.sql(),
        }
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        match self {
            GridAggregator::Vector(_) => GeometryKind::VectorOnly,
            GridAggregator::Raster(_) => GeometryKind::RasterCapable,
        }
    }

    pub fn request(&self) -> &RenderAggregationRequest {
        match self {
            GridAggregator::Vector(aggregator) => aggregator.request(),
            GridAggregator::Raster(aggregator) => aggregator.request(),
        }
    }
}

/// Picks the vector or raster aggregator for a layer of a map.
#[derive(Debug, Clone)]
pub struct AggregationSelector {
    aggregator: GridAggregator,
}

impl AggregationSelector {
    /// Fails with `InvalidAggregationPlacement`/`InvalidResolution` for a
    /// bad request, and `UnsupportedAggregationType` when the map config
    /// cannot be classified.
    pub fn new(map_config: &dyn MapConfig, request: RenderAggregationRequest) -> MapResult<Self> {
        request.validate()?;

        let aggregator = match map_config.geometry_kind() {
            Some(GeometryKind::VectorOnly) => {
                GridAggregator::Vector(VectorGridAggregator::new(request))
            }
            Some(GeometryKind::RasterCapable) => {
                GridAggregator::Raster(RasterGridAggregator::new(request))
            }
            None => {
                return Err(MapError::UnsupportedAggregationType(
                    "map config has no layers to classify".to_string(),
                ))
            }
        };

        debug!(kind = ?aggregator.geometry_kind(), "Selected aggregation strategy");

        Ok(Self { aggregator })
    }

    /// Selector for the layer at `index`, using its own options.
    pub fn for_layer(map_config: &dyn MapConfig, index: usize) -> MapResult<Self> {
        let layer = map_config.layers().get(index).ok_or_else(|| {
            MapError::InvalidMapConfig(format!("Layer {} does not exist", index))
        })?;
        Self::new(map_config, RenderAggregationRequest::from_layer(layer))
    }

    pub fn aggregator(&self) -> &GridAggregator {
        &self.aggregator
    }

    pub fn sql(&self) -> MapResult<String> {
        self.aggregator.sql()
    }
}

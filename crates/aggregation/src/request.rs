//! Render parameters of an aggregated layer.

use std::collections::BTreeMap;

use map_common::{AggregateSpec, Layer, MapError, MapResult};

use crate::placement::Placement;

/// Row count above which callers aggregate a layer. Not read here.
pub const DEFAULT_THRESHOLD: u64 = 100_000;

/// Grid cell size in pixels.
pub const DEFAULT_RESOLUTION: f64 = 256.0;

pub const DEFAULT_PLACEMENT: &str = "centroid";

/// Aggregation parameters for one layer render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderAggregationRequest {
    pub source_query: String,
    pub resolution: f64,
    pub placement: String,
    /// Passed through for the caller's aggregate/don't-aggregate decision
    pub threshold: u64,
    pub columns: BTreeMap<String, AggregateSpec>,
}

impl RenderAggregationRequest {
    pub fn new(source_query: impl Into<String>) -> Self {
        Self {
            source_query: source_query.into(),
            resolution: DEFAULT_RESOLUTION,
            placement: DEFAULT_PLACEMENT.to_string(),
            threshold: DEFAULT_THRESHOLD,
            columns: BTreeMap::new(),
        }
    }

    /// Build a request from a layer's `options`, applying defaults for
    /// anything not set.
    pub fn from_layer(layer: &Layer) -> Self {
        let options = &layer.options;
        Self {
            source_query: options.sql.clone(),
            resolution: options.resolution.unwrap_or(DEFAULT_RESOLUTION),
            placement: options
                .placement
                .clone()
                .unwrap_or_else(|| DEFAULT_PLACEMENT.to_string()),
            threshold: options.threshold.unwrap_or(DEFAULT_THRESHOLD),
            columns: options.columns.clone(),
        }
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_placement(mut self, placement: impl Into<String>) -> Self {
        self.placement = placement.into();
        self
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, spec: AggregateSpec) -> Self {
        self.columns.insert(name.into(), spec);
        self
    }

    /// Parsed placement.
    pub fn placement(&self) -> MapResult<Placement> {
        self.placement.parse()
    }

    /// Check the resolution and placement invariants.
    pub fn validate(&self) -> MapResult<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(MapError::InvalidResolution(self.resolution));
        }
        self.placement()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = RenderAggregationRequest::new("SELECT 1");
        assert_eq!(request.resolution, 256.0);
        assert_eq!(request.placement, "centroid");
        assert_eq!(request.threshold, 100_000);
        assert!(request.columns.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_invalid_resolution() {
        for resolution in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let request = RenderAggregationRequest::new("SELECT 1").with_resolution(resolution);
            assert!(matches!(
                request.validate(),
                Err(MapError::InvalidResolution(_))
            ));
        }
    }

    #[test]
    fn test_invalid_placement() {
        let request = RenderAggregationRequest::new("SELECT 1").with_placement("hexagon");
        assert!(matches!(
            request.validate(),
            Err(MapError::InvalidAggregationPlacement(ref p)) if p == "hexagon"
        ));
    }

    #[test]
    fn test_from_layer() {
        let mut layer = Layer::new("mapnik", "select * from populated_places");
        layer.options.resolution = Some(64.0);
        layer.options.placement = Some("point-grid".to_string());
        layer.options.threshold = Some(1);
        layer
            .options
            .columns
            .insert("pop_max".to_string(), AggregateSpec::function("max", "pop"));

        let request = RenderAggregationRequest::from_layer(&layer);
        assert_eq!(request.source_query, "select * from populated_places");
        assert_eq!(request.resolution, 64.0);
        assert_eq!(request.placement().unwrap(), Placement::PointGrid);
        assert_eq!(request.threshold, 1);
        assert_eq!(request.columns.len(), 1);
    }

    #[test]
    fn test_from_layer_defaults() {
        let layer = Layer::new("mapnik", "select 1");
        assert_eq!(
            RenderAggregationRequest::from_layer(&layer),
            RenderAggregationRequest::new("select 1")
        );
    }
}

//! Aggregation for maps that may be rasterized.

use map_common::MapResult;
use tracing::debug;

use crate::placement::{template_for, TemplateContext};
use crate::request::RenderAggregationRequest;

/// Bins rows with the placement template chosen by the caller.
#[derive(Debug, Clone)]
pub struct RasterGridAggregator {
    request: RenderAggregationRequest,
}

impl RasterGridAggregator {
    pub fn new(request: RenderAggregationRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &RenderAggregationRequest {
        &self.request
    }

    pub fn sql(&self) -> MapResult<String> {
        let template = template_for(&self.request.placement)?;
        debug!(
            placement = %self.request.placement,
            resolution = self.request.resolution,
            columns = self.request.columns.len(),
            "Building raster aggregation query"
        );
        template(&TemplateContext {
            source_query: &self.request.source_query,
            resolution: self.request.resolution,
            columns: &self.request.columns,
        })
    }
}

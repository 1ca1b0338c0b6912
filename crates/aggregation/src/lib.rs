//! Render-time aggregation of layer queries.
//!
//! Large point datasets are replaced at render time by grid clusters. This
//! crate builds the SQL that performs the clustering; executing it is the
//! renderer's job. The generated SQL keeps the renderer substitution tokens
//! (`!bbox!`, `!scale_denominator!`).
//!
//! - [`AggregationSelector`] picks the vector or raster strategy from the
//!   map config
//! - [`VectorGridAggregator`] always bins on the canonical zoom grid
//! - [`RasterGridAggregator`] uses one of the [`placement`] templates

pub mod columns;
pub mod placement;
pub mod raster;
pub mod request;
pub mod selector;
pub mod vector;

pub use columns::{AggregateFunction, FEATURE_COUNT_COLUMN};
pub use placement::{template_for, Placement, TemplateContext, TemplateFn};
pub use raster::RasterGridAggregator;
pub use request::{RenderAggregationRequest, DEFAULT_PLACEMENT, DEFAULT_RESOLUTION, DEFAULT_THRESHOLD};
pub use selector::{AggregationSelector, GridAggregator};
pub use vector::VectorGridAggregator;

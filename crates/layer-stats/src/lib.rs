//! Layer statistics for map configs.
//!
//! Each layer of a map is routed to the first collector that handles its
//! type. Collectors for all layers run concurrently on the caller's
//! connection and the results are returned in layer order:
//! - [`RowCountEstimator`] for `mapnik`/`cartodb` layers
//! - [`NullStatsCollector`] for `torque` layers
//! - [`FallbackStatsCollector`] for the types a registry wants ignored

pub mod collector;
pub mod coordinator;
pub mod metadata;
pub mod postgres;
pub mod queries;
pub mod registry;

pub use collector::{
    FallbackStatsCollector, LayerStats, LayerTypeCollector, NullStatsCollector, RowCountEstimator,
    UNDETERMINED_FEATURE_COUNT,
};
pub use coordinator::{LayerStatsCoordinator, LayerStatsResult};
pub use metadata::ColumnStats;
pub use postgres::PgDbConnection;
pub use registry::{CollectorSelector, LayerStatsCollectorRegistry};

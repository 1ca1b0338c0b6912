//! Common types shared by the aggregation and layer statistics crates.

pub mod connection;
pub mod error;
pub mod layer;
pub mod mapconfig;
pub mod tokens;

pub use connection::{ColumnInfo, DbConnection, Row};
pub use error::{MapError, MapResult};
pub use layer::{
    AggregateSpec, ColumnStatsOptions, Layer, LayerMetadataOptions, LayerOptions, LayerType,
    SampleOptions,
};
pub use mapconfig::{GeometryKind, MapConfig, MapConfigDocument};
pub use tokens::TokenValues;

//! Error types for map aggregation and statistics.

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// Primary error type for aggregation and layer statistics operations.
#[derive(Debug, Error)]
pub enum MapError {
    // === Aggregation Errors ===
    #[error("Invalid Aggregation placement: '{0}'")]
    InvalidAggregationPlacement(String),

    #[error("Unsupported aggregation type: {0}")]
    UnsupportedAggregationType(String),

    #[error("Invalid Aggregate function: '{0}'")]
    InvalidAggregateFunction(String),

    #[error("Invalid aggregation resolution: {0} (must be greater than 0)")]
    InvalidResolution(f64),

    // === Map Config Errors ===
    #[error("Invalid map config: {0}")]
    InvalidMapConfig(String),

    // === Database Errors ===
    #[error("Database query failed: {0}")]
    DatabaseQueryFailure(String),
}

impl MapError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            MapError::InvalidAggregationPlacement(_)
            | MapError::UnsupportedAggregationType(_)
            | MapError::InvalidAggregateFunction(_)
            | MapError::InvalidResolution(_)
            | MapError::InvalidMapConfig(_) => 400,

            MapError::DatabaseQueryFailure(_) => 500,
        }
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::InvalidMapConfig(format!("JSON error: {}", err))
    }
}

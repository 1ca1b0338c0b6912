//! Collector sequences per statistics request kind.

use std::fmt;
use std::str::FromStr;

use map_common::{LayerType, MapError};

use crate::collector::{
    FallbackStatsCollector, LayerTypeCollector, NullStatsCollector, RowCountEstimator,
};

/// Which specialized collector is live for a statistics request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorSelector {
    #[default]
    All,
    Mapnik,
    Torque,
}

impl FromStr for CollectorSelector {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" | "all" => Ok(CollectorSelector::All),
            "mapnik" => Ok(CollectorSelector::Mapnik),
            "torque" => Ok(CollectorSelector::Torque),
            other => Err(MapError::InvalidMapConfig(format!(
                "Unknown layer stats selector: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CollectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollectorSelector::All => "ALL",
            CollectorSelector::Mapnik => "mapnik",
            CollectorSelector::Torque => "torque",
        })
    }
}

/// Builds the ordered collector sequence for a selector.
///
/// Dispatch picks the first collector handling a layer type, so the
/// fallback placed first swallows the types the selector is not
/// interested in and they still get well-formed empty stats.
pub struct LayerStatsCollectorRegistry;

impl LayerStatsCollectorRegistry {
    pub fn build(selector: CollectorSelector) -> Vec<LayerTypeCollector> {
        match selector {
            CollectorSelector::All => vec![
                fallback([LayerType::Http, LayerType::Plain]),
                LayerTypeCollector::RowCountEstimator(RowCountEstimator::new()),
                LayerTypeCollector::Null(NullStatsCollector::new()),
            ],
            CollectorSelector::Mapnik => vec![
                fallback([LayerType::Http, LayerType::Plain, LayerType::Torque]),
                LayerTypeCollector::RowCountEstimator(RowCountEstimator::new()),
            ],
            CollectorSelector::Torque => vec![
                fallback([LayerType::Http, LayerType::Plain, LayerType::Mapnik]),
                LayerTypeCollector::Null(NullStatsCollector::new()),
            ],
        }
    }
}

fn fallback(types: impl IntoIterator<Item = LayerType>) -> LayerTypeCollector {
    LayerTypeCollector::Fallback(FallbackStatsCollector::new(types))
}

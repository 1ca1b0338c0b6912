//! Concurrent statistics collection for a whole map.

use futures::stream::{self, StreamExt};
use metrics::counter;
use tracing::{debug, instrument, warn};

use map_common::{DbConnection, MapConfig, MapError, MapResult};

use crate::collector::{LayerStats, LayerTypeCollector};
use crate::registry::{CollectorSelector, LayerStatsCollectorRegistry};

/// Statistics of every layer, in declaration order.
pub type LayerStatsResult = Vec<LayerStats>;

/// Dispatches the layers of a map to their collectors.
#[derive(Debug, Clone)]
pub struct LayerStatsCoordinator {
    collectors: Vec<LayerTypeCollector>,
}

impl Default for LayerStatsCoordinator {
    fn default() -> Self {
        Self::from_selector(CollectorSelector::All)
    }
}

impl LayerStatsCoordinator {
    pub fn new(collectors: Vec<LayerTypeCollector>) -> Self {
        Self { collectors }
    }

    pub fn from_selector(selector: CollectorSelector) -> Self {
        Self::new(LayerStatsCollectorRegistry::build(selector))
    }

    pub fn collectors(&self) -> &[LayerTypeCollector] {
        &self.collectors
    }

    /// First collector, in registry order, handling the layer type.
    fn collector_for(&self, map_config: &dyn MapConfig, index: usize) -> Option<&LayerTypeCollector> {
        let layer_type = map_config.layer_type(index)?;
        self.collectors.iter().find(|c| c.can_handle(layer_type))
    }

    /// Collect statistics for every layer of the map.
    ///
    /// All layers are queried concurrently over `db`. If any collector
    /// fails, the first error observed is returned once every in-flight
    /// query has finished. Layers no collector handles get empty stats.
    #[instrument(skip_all, fields(layers = map_config.layers().len()))]
    pub async fn get_stats(
        &self,
        map_config: &dyn MapConfig,
        db: &dyn DbConnection,
    ) -> MapResult<LayerStatsResult> {
        let layers = map_config.layers();
        if layers.is_empty() {
            return Ok(Vec::new());
        }

        counter!("layer_stats_requests_total").increment(1);

        let mut slots: Vec<Option<LayerStats>> = vec![None; layers.len()];
        let mut tasks = Vec::with_capacity(layers.len());

        for (index, layer) in layers.iter().enumerate() {
            match self.collector_for(map_config, index) {
                Some(collector) => {
                    debug!(index, collector = collector.name(), "Dispatching layer stats");
                    tasks.push(async move { (index, collector.collect(layer, db).await) });
                }
                None => {
                    debug!(index, layer_type = %layer.layer_type, "No stats collector for layer");
                    slots[index] = Some(LayerStats::default());
                }
            }
        }

        // Every layer in flight at once; results arrive in completion order
        let concurrency = tasks.len().max(1);
        let results = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut first_error: Option<MapError> = None;
        for (index, result) in results {
            match result {
                Ok(stats) => slots[index] = Some(stats),
                Err(e) => {
                    warn!(index, error = %e, "Layer stats failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            counter!("layer_stats_failures_total").increment(1);
            return Err(e);
        }

        Ok(slots.into_iter().map(Option::unwrap_or_default).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::{Layer, MapConfigDocument};
    use test_utils::MockDbConnection;

    #[tokio::test]
    async fn test_empty_map() {
        let db = MockDbConnection::failing("unused");
        let stats = LayerStatsCoordinator::default()
            .get_stats(&MapConfigDocument::default(), &db)
            .await
            .unwrap();
        assert!(stats.is_empty());
        assert!(db.queries().is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_layer_gets_empty_stats() {
        let map = MapConfigDocument::new(vec![
            Layer::new("named", ""),
            Layer::new("mapnik", "select * from t"),
        ]);
        let db = MockDbConnection::new();
        let stats = LayerStatsCoordinator::default()
            .get_stats(&map, &db)
            .await
            .unwrap();
        assert_eq!(stats, vec![LayerStats::default(), LayerStats::estimated(1)]);
    }
}

//! Map config abstraction consumed by aggregation and statistics.

use serde::{Deserialize, Serialize};

use crate::{Layer, LayerType, MapError, MapResult};

/// Geometry classification of a whole map config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    /// Every layer is served as vector tiles only
    VectorOnly,
    /// At least one layer may be rasterized
    RasterCapable,
}

/// Read-only view of a map config.
pub trait MapConfig: Send + Sync {
    /// Layers in declaration order.
    fn layers(&self) -> &[Layer];

    /// Type of the layer at `index`, if it exists.
    fn layer_type(&self, index: usize) -> Option<&LayerType> {
        self.layers().get(index).map(|layer| &layer.layer_type)
    }

    /// True when every layer is a SQL layer without CartoCSS, i.e. the map
    /// can only be requested as MVT.
    fn is_vector_only(&self) -> bool {
        let layers = self.layers();
        !layers.is_empty()
            && layers.iter().all(|layer| {
                matches!(layer.layer_type, LayerType::Mapnik | LayerType::Cartodb)
                    && layer.options.cartocss.is_none()
            })
    }

    /// Classify the map for aggregation.
    ///
    /// A map without layers cannot be classified.
    fn geometry_kind(&self) -> Option<GeometryKind> {
        if self.layers().is_empty() {
            return None;
        }
        if self.is_vector_only() {
            Some(GeometryKind::VectorOnly)
        } else {
            Some(GeometryKind::RasterCapable)
        }
    }
}

/// Map config as sent by clients: `{"version": "1.5.0", "layers": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfigDocument {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub layers: Vec<Layer>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl MapConfigDocument {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            version: default_version(),
            layers,
        }
    }

    /// Parse a map config document from JSON text.
    pub fn from_json(json: &str) -> MapResult<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// SQL-backed layers must carry a query.
    pub fn validate(&self) -> MapResult<()> {
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.layer_type.is_sql_backed() && layer.options.sql.trim().is_empty() {
                return Err(MapError::InvalidMapConfig(format!(
                    "Missing sql for layer {} of type '{}'",
                    index, layer.layer_type
                )));
            }
        }
        Ok(())
    }
}

impl MapConfig for MapConfigDocument {
    fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

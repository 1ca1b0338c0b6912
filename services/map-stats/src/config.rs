//! Map config document loading.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use map_common::{MapConfig, MapConfigDocument};

/// Load and validate a map config document from a JSON file.
pub fn load_map_config(path: &Path) -> Result<MapConfigDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read map config: {}", path.display()))?;

    let document = MapConfigDocument::from_json(&content)
        .with_context(|| format!("Failed to parse map config: {}", path.display()))?;

    for (index, layer) in document.layers().iter().enumerate() {
        debug!(index, layer_type = %layer.layer_type, "Loaded layer");
    }
    info!(
        path = %path.display(),
        layers = document.layers().len(),
        vector_only = document.is_vector_only(),
        "Loaded map config"
    );

    Ok(document)
}

//! Common map config fixtures.
//!
//! Layer queries reference distinct tables so a [`crate::MockDbConnection`]
//! rule can target a single layer by table name.

use map_common::{Layer, MapConfigDocument};

pub const POINTS_SQL: &str = "select * from populated_places_simple_reduced";

pub const TORQUE_SQL: &str = "select * from torque_events";

pub const CARTOCSS: &str = "#layer { marker-fill: red; marker-width: 8; marker-allow-overlap: true; }";

/// Styled mapnik layer over `table`.
pub fn mapnik_layer(table: &str) -> Layer {
    let mut layer = Layer::new("mapnik", format!("select * from {}", table));
    layer.options.cartocss = Some(CARTOCSS.to_string());
    layer
}

/// Mapnik layer without CartoCSS, only renderable as MVT.
pub fn mvt_layer(table: &str) -> Layer {
    Layer::new("mapnik", format!("select * from {}", table))
}

pub fn cartodb_layer(table: &str) -> Layer {
    let mut layer = Layer::new("cartodb", format!("select * from {}", table));
    layer.options.cartocss = Some(CARTOCSS.to_string());
    layer
}

pub fn torque_layer() -> Layer {
    let mut layer = Layer::new("torque", TORQUE_SQL);
    layer.options.cartocss = Some("Map { -torque-frame-count: 16; }".to_string());
    layer
}

pub fn http_layer() -> Layer {
    Layer::new("http", "")
}

pub fn plain_layer() -> Layer {
    Layer::new("plain", "")
}

pub fn map_config(layers: Vec<Layer>) -> MapConfigDocument {
    MapConfigDocument {
        version: "1.5.0".to_string(),
        layers,
    }
}

/// `[mapnik, torque, http]`.
pub fn mixed_map() -> MapConfigDocument {
    map_config(vec![
        mapnik_layer("populated_places_simple_reduced"),
        torque_layer(),
        http_layer(),
    ])
}

/// Two MVT-only layers.
pub fn vector_map() -> MapConfigDocument {
    map_config(vec![
        mvt_layer("populated_places_simple_reduced"),
        mvt_layer("airbnb_listings"),
    ])
}

/// One styled layer, so the map may be rasterized.
pub fn raster_map() -> MapConfigDocument {
    map_config(vec![mapnik_layer("populated_places_simple_reduced")])
}

//! Renderer substitution tokens (`!bbox!`, `!scale_denominator!`, ...).
//!
//! Generated SQL keeps these tokens; the renderer resolves them per tile.
//! Statistics queries run outside the renderer and need them replaced.

use std::f64::consts::PI;

/// Known tokens, in canonical order.
pub const TOKENS: [&str; 4] = ["bbox", "scale_denominator", "pixel_width", "pixel_height"];

/// Web Mercator world size in meters.
const WEB_MERCATOR_SIZE: f64 = 6378137.0 * 2.0 * PI;

/// Tile size in pixels.
const TILE_PIXELS: f64 = 256.0;

/// Standardized rendering pixel size in meters (OGC 0.28mm).
const STANDARD_PIXEL_SIZE: f64 = 0.00028;

/// Deepest zoom level token values are computed for. Larger zooms are clamped.
pub const MAX_ZOOM: u32 = 30;

/// Replacement values for every known token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenValues {
    pub bbox: String,
    pub scale_denominator: String,
    pub pixel_width: String,
    pub pixel_height: String,
}

impl TokenValues {
    /// Placeholder values that keep the query valid without a tile context.
    pub fn dummy() -> Self {
        Self {
            bbox: "ST_MakeEnvelope(0,0,0,0)".to_string(),
            scale_denominator: "0".to_string(),
            pixel_width: "1".to_string(),
            pixel_height: "1".to_string(),
        }
    }

    /// Values for a Web Mercator zoom level.
    ///
    /// The bbox covers the whole world, or only the first tile when
    /// `single_tile` is set. Zooms above [`MAX_ZOOM`] are clamped.
    pub fn for_zoom(zoom: u32, single_tile: bool) -> Self {
        let n_tiles = 2f64.powi(zoom.min(MAX_ZOOM) as i32);
        let tile_size = WEB_MERCATOR_SIZE / n_tiles;
        let resolution = tile_size / TILE_PIXELS;
        let scale_denominator = resolution / STANDARD_PIXEL_SIZE;
        let x0 = -WEB_MERCATOR_SIZE / 2.0;
        let y0 = -WEB_MERCATOR_SIZE / 2.0;
        let extent = if single_tile {
            tile_size
        } else {
            WEB_MERCATOR_SIZE
        };

        Self {
            bbox: format!(
                "ST_MakeEnvelope({}, {}, {}, {}, 3857)",
                x0,
                y0,
                x0 + extent,
                y0 + extent
            ),
            scale_denominator: scale_denominator.to_string(),
            pixel_width: resolution.to_string(),
            pixel_height: resolution.to_string(),
        }
    }

    fn value(&self, token: &str) -> Option<&str> {
        match token {
            "bbox" => Some(&self.bbox),
            "scale_denominator" => Some(&self.scale_denominator),
            "pixel_width" => Some(&self.pixel_width),
            "pixel_height" => Some(&self.pixel_height),
            _ => None,
        }
    }
}

fn marker(token: &str) -> String {
    format!("!{}!", token)
}

/// Known tokens present in `sql`.
pub fn tokens(sql: &str) -> Vec<&'static str> {
    TOKENS
        .iter()
        .copied()
        .filter(|token| sql.contains(&marker(token)))
        .collect()
}

pub fn has_tokens(sql: &str) -> bool {
    TOKENS.iter().any(|token| sql.contains(&marker(token)))
}

/// Replace every known token occurrence in `sql`.
pub fn replace(sql: &str, values: &TokenValues) -> String {
    TOKENS.iter().fold(sql.to_string(), |acc, token| {
        match values.value(token) {
            Some(value) => acc.replace(&marker(token), value),
            None => acc,
        }
    })
}

pub fn substitute_dummy_tokens(sql: &str) -> String {
    replace(sql, &TokenValues::dummy())
}

pub fn substitute_tokens_for_zoom(sql: &str, zoom: u32, single_tile: bool) -> String {
    replace(sql, &TokenValues::for_zoom(zoom, single_tile))
}

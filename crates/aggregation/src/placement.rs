//! Placement templates for raster aggregation.
//!
//! Every template bins the source rows on a square grid whose cell size is
//! `resolution` pixels at the zoom being rendered, and differs only in how
//! the point representing each cell is chosen.
//!
//! `resolution*0.00028/256*!scale_denominator!` is equivalent to
//! `resolution/256*CDB_XYZ_Resolution(CDB_ZoomFromScale(!scale_denominator!))`.
//! Rows are filtered with `!bbox!` before grouping because the renderer
//! only applies its own bbox filter around the aggregated query.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use map_common::{AggregateSpec, MapError, MapResult};

use crate::columns::{aggregate_column_defs, aggregate_column_names};

/// Parameters shared by all placement templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub source_query: &'a str,
    /// Grid cell size in pixels
    pub resolution: f64,
    pub columns: &'a BTreeMap<String, AggregateSpec>,
}

/// A compiled placement template.
pub type TemplateFn = fn(&TemplateContext<'_>) -> MapResult<String>;

/// Rule used to pick the point representing a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Average of the clustered coordinates
    Centroid,
    /// Point computed from the cell indices
    PointGrid,
    /// Row with the lowest `cartodb_id` in the cell, with its own geometry
    PointSample,
}

impl Placement {
    pub const ALL: [Placement; 3] = [
        Placement::Centroid,
        Placement::PointGrid,
        Placement::PointSample,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placement::Centroid => "centroid",
            Placement::PointGrid => "point-grid",
            Placement::PointSample => "point-sample",
        }
    }

    pub fn template(&self) -> TemplateFn {
        match self {
            Placement::Centroid => centroid,
            Placement::PointGrid => point_grid,
            Placement::PointSample => point_sample,
        }
    }
}

impl FromStr for Placement {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Placement::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| MapError::InvalidAggregationPlacement(s.to_string()))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up the template registered under `placement`.
pub fn template_for(placement: &str) -> MapResult<TemplateFn> {
    Ok(placement.parse::<Placement>()?.template())
}

fn params_cte(resolution: f64) -> String {
    format!(
        "_cdb_params AS (
  SELECT
    ({}*0.00028/256*!scale_denominator!)::double precision AS res,
    !bbox! AS bbox
)",
        resolution
    )
}

const GRID_X: &str = "Floor(ST_X(_cdb_query.the_geom_webmercator)/_cdb_params.res)";
const GRID_Y: &str = "Floor(ST_Y(_cdb_query.the_geom_webmercator)/_cdb_params.res)";

fn centroid(ctx: &TemplateContext<'_>) -> MapResult<String> {
    let column_defs = aggregate_column_defs(ctx.columns)?;

    Ok(format!(
        "WITH {params}
SELECT
  row_number() over() AS cartodb_id,
  ST_SetSRID(
    ST_MakePoint(
      AVG(ST_X(_cdb_query.the_geom_webmercator)),
      AVG(ST_Y(_cdb_query.the_geom_webmercator))
    ), 3857
  ) AS the_geom_webmercator,
  {columns}
FROM ({source}) _cdb_query, _cdb_params
WHERE _cdb_query.the_geom_webmercator && _cdb_params.bbox
GROUP BY {gx}, {gy}",
        params = params_cte(ctx.resolution),
        columns = column_defs.join(",\n  "),
        source = ctx.source_query,
        gx = GRID_X,
        gy = GRID_Y,
    ))
}

// The final point uses `gx*(res+0.5)` and `gy*(res*0.5)`, which is not the
// cell center on either axis. Kept as deployed until the intended formula
// is confirmed.
fn point_grid(ctx: &TemplateContext<'_>) -> MapResult<String> {
    let column_defs = aggregate_column_defs(ctx.columns)?;
    let column_names = aggregate_column_names(ctx.columns, Some("_cdb_clusters"));

    Ok(format!(
        "WITH {params},
_cdb_clusters AS (
  SELECT
    {gx}::int AS _cdb_gx,
    {gy}::int AS _cdb_gy,
    {columns}
  FROM ({source}) _cdb_query, _cdb_params
  WHERE _cdb_query.the_geom_webmercator && _cdb_params.bbox
  GROUP BY _cdb_gx, _cdb_gy
)
SELECT
  ST_SetSRID(ST_MakePoint(_cdb_gx*(res+0.5), _cdb_gy*(res*0.5)), 3857) AS the_geom_webmercator,
  {names}
FROM _cdb_clusters, _cdb_params",
        params = params_cte(ctx.resolution),
        columns = column_defs.join(",\n    "),
        names = column_names.join(",\n  "),
        source = ctx.source_query,
        gx = GRID_X,
        gy = GRID_Y,
    ))
}

fn point_sample(ctx: &TemplateContext<'_>) -> MapResult<String> {
    let column_defs = aggregate_column_defs(ctx.columns)?;
    let column_names = aggregate_column_names(ctx.columns, Some("_cdb_clusters"));

    Ok(format!(
        "WITH {params},
_cdb_clusters AS (
  SELECT
    MIN(_cdb_query.cartodb_id) AS cartodb_id,
    {columns}
  FROM ({source}) _cdb_query, _cdb_params
  WHERE _cdb_query.the_geom_webmercator && _cdb_params.bbox
  GROUP BY {gx}, {gy}
)
SELECT
  _cdb_clusters.cartodb_id,
  _cdb_query.the_geom,
  _cdb_query.the_geom_webmercator,
  {names}
FROM _cdb_clusters INNER JOIN ({source}) _cdb_query
  ON (_cdb_clusters.cartodb_id = _cdb_query.cartodb_id)",
        params = params_cte(ctx.resolution),
        columns = column_defs.join(",\n    "),
        names = column_names.join(",\n  "),
        source = ctx.source_query,
        gx = GRID_X,
        gy = GRID_Y,
    ))
}

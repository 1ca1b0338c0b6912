//! Layer definitions as declared in a map config document.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Layer type as declared by the map config (`"type": "mapnik"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LayerType {
    Mapnik,
    Cartodb,
    Torque,
    Http,
    Plain,
    Named,
    Other(String),
}

impl LayerType {
    pub fn as_str(&self) -> &str {
        match self {
            LayerType::Mapnik => "mapnik",
            LayerType::Cartodb => "cartodb",
            LayerType::Torque => "torque",
            LayerType::Http => "http",
            LayerType::Plain => "plain",
            LayerType::Named => "named",
            LayerType::Other(name) => name,
        }
    }

    /// Layers whose data comes from a PostGIS query.
    pub fn is_sql_backed(&self) -> bool {
        matches!(self, LayerType::Mapnik | LayerType::Cartodb | LayerType::Torque)
    }
}

impl From<&str> for LayerType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mapnik" => LayerType::Mapnik,
            "cartodb" => LayerType::Cartodb,
            "torque" => LayerType::Torque,
            "http" => LayerType::Http,
            "plain" => LayerType::Plain,
            "named" => LayerType::Named,
            _ => LayerType::Other(s.to_string()),
        }
    }
}

impl From<String> for LayerType {
    fn from(s: String) -> Self {
        LayerType::from(s.as_str())
    }
}

impl From<LayerType> for String {
    fn from(layer_type: LayerType) -> Self {
        layer_type.as_str().to_string()
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single layer of a map config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    /// Optional client-provided identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub layer_type: LayerType,

    #[serde(default)]
    pub options: LayerOptions,
}

impl Layer {
    pub fn new(layer_type: impl Into<LayerType>, sql: impl Into<String>) -> Self {
        Self {
            id: None,
            layer_type: layer_type.into(),
            options: LayerOptions {
                sql: sql.into(),
                ..Default::default()
            },
        }
    }
}

/// Options block of a layer.
///
/// Aggregation parameters (`resolution`, `threshold`, `placement`,
/// `columns`) are only consulted when the layer is aggregated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerOptions {
    /// Source query used for rendering
    #[serde(default)]
    pub sql: String,

    /// Query before any rewriting (overviews, filters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_raw: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cartocss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, AggregateSpec>,

    /// Extra statistics requested for the layer metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LayerMetadataOptions>,
}

impl LayerOptions {
    /// Query to use for exact statistics, falling back to `sql`.
    pub fn raw_sql(&self) -> &str {
        self.sql_raw.as_deref().unwrap_or(&self.sql)
    }
}

/// Definition of an aggregated output column.
///
/// An explicit `aggregate_expression` takes precedence over the
/// function/column pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_expression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_function: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated_column: Option<String>,
}

impl AggregateSpec {
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            aggregate_expression: Some(expression.into()),
            ..Default::default()
        }
    }

    pub fn function(function: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            aggregate_expression: None,
            aggregate_function: Some(function.into()),
            aggregated_column: Some(column.into()),
        }
    }
}

/// Per-layer switches for the optional statistics queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetadataOptions {
    #[serde(default)]
    pub feature_count: bool,

    #[serde(default)]
    pub geometry_type: bool,

    /// Report column names and types
    #[serde(default)]
    pub columns: bool,

    /// `true` or an options object
    #[serde(
        default,
        deserialize_with = "flag_or_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub column_stats: Option<ColumnStatsOptions>,

    /// `true` or an options object
    #[serde(
        default,
        deserialize_with = "flag_or_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub sample: Option<SampleOptions>,

    /// Zoom level at which the aggregated query is counted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggr_feature_count: Option<u32>,
}

impl LayerMetadataOptions {
    /// Column names and types are needed for either `columns` or `columnStats`.
    pub fn needs_columns(&self) -> bool {
        self.columns || self.column_stats.is_some()
    }
}

/// Options of the `columnStats` metadata query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_categories: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_nulls: Option<bool>,
}

impl ColumnStatsOptions {
    pub const DEFAULT_TOP_CATEGORIES: u32 = 1024;

    pub fn top_categories(&self) -> u32 {
        self.top_categories.unwrap_or(Self::DEFAULT_TOP_CATEGORIES)
    }

    pub fn include_nulls(&self) -> bool {
        self.include_nulls.unwrap_or(true)
    }
}

/// Options of the `sample` metadata query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_rows: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_columns: Option<Vec<String>>,
}

impl SampleOptions {
    pub const DEFAULT_ROWS: u64 = 100;

    pub fn num_rows(&self) -> u64 {
        self.num_rows.unwrap_or(Self::DEFAULT_ROWS)
    }
}

/// Accepts `true`/`false` or an options object; `true` means default options.
fn flag_or_options<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Setting<T> {
        Flag(bool),
        Options(T),
    }

    Ok(match Option::<Setting<T>>::deserialize(deserializer)? {
        Some(Setting::Flag(true)) => Some(T::default()),
        Some(Setting::Options(options)) => Some(options),
        Some(Setting::Flag(false)) | None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_type_parse() {
        assert_eq!(LayerType::from("mapnik"), LayerType::Mapnik);
        assert_eq!(LayerType::from("CartoDB"), LayerType::Cartodb);
        assert_eq!(
            LayerType::from("wadus"),
            LayerType::Other("wadus".to_string())
        );
        assert_eq!(LayerType::Other("wadus".into()).as_str(), "wadus");
    }

    #[test]
    fn test_layer_deserialize() {
        let layer: Layer = serde_json::from_str(
            r#"{
                "type": "mapnik",
                "options": {
                    "sql": "select * from test_table",
                    "placement": "point-sample",
                    "columns": {
                        "total": { "aggregate_function": "sum", "aggregated_column": "amount" }
                    },
                    "metadata": { "featureCount": true }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(layer.layer_type, LayerType::Mapnik);
        assert_eq!(layer.options.placement.as_deref(), Some("point-sample"));
        assert_eq!(
            layer.options.columns["total"],
            AggregateSpec::function("sum", "amount")
        );
        let metadata = layer.options.metadata.as_ref().unwrap();
        assert!(metadata.feature_count);
        assert!(!metadata.geometry_type);
        assert!(!metadata.needs_columns());
        assert_eq!(layer.options.raw_sql(), "select * from test_table");
    }

    #[test]
    fn test_metadata_options() {
        let metadata: LayerMetadataOptions = serde_json::from_str(
            r#"{
                "columnStats": { "topCategories": 5, "includeNulls": false },
                "sample": { "num_rows": 10, "include_columns": ["name"] },
                "aggrFeatureCount": 3
            }"#,
        )
        .unwrap();

        let stats = metadata.column_stats.as_ref().unwrap();
        assert_eq!(stats.top_categories(), 5);
        assert!(!stats.include_nulls());
        assert!(metadata.needs_columns());

        let sample = metadata.sample.as_ref().unwrap();
        assert_eq!(sample.num_rows(), 10);
        assert_eq!(sample.include_columns.as_deref(), Some(&["name".to_string()][..]));
        assert_eq!(metadata.aggr_feature_count, Some(3));
    }

    #[test]
    fn test_metadata_flags() {
        let metadata: LayerMetadataOptions =
            serde_json::from_str(r#"{"columnStats": true, "sample": false, "columns": true}"#)
                .unwrap();

        let stats = metadata.column_stats.unwrap();
        assert_eq!(stats.top_categories(), 1024);
        assert!(stats.include_nulls());
        assert!(metadata.sample.is_none());
        assert!(metadata.columns);
        assert_eq!(metadata.aggr_feature_count, None);
    }
}

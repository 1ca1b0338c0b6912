//! Aggregated output columns.

use std::collections::BTreeMap;
use std::str::FromStr;

use map_common::{AggregateSpec, MapError, MapResult};

/// Column added to every aggregation with the number of clustered rows.
pub const FEATURE_COUNT_COLUMN: &str = "_cdb_feature_count";

/// Aggregate functions accepted in column definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Avg,
    Sum,
    Min,
    Max,
    Mode,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 6] = [
        AggregateFunction::Count,
        AggregateFunction::Avg,
        AggregateFunction::Sum,
        AggregateFunction::Min,
        AggregateFunction::Max,
        AggregateFunction::Mode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Mode => "mode",
        }
    }

    /// SQL for this function over `column`.
    ///
    /// `count` defaults to `*`; the others default to the output column,
    /// which lets `{"total": {"aggregate_function": "sum"}}` sum `total`.
    pub fn sql(&self, column_name: &str, aggregated_column: Option<&str>) -> String {
        match self {
            AggregateFunction::Count => format!("count({})", aggregated_column.unwrap_or("*")),
            AggregateFunction::Mode => {
                format!("_cdb_mode({})", aggregated_column.unwrap_or(column_name))
            }
            _ => format!("{}({})", self.name(), aggregated_column.unwrap_or(column_name)),
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateFunction::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| MapError::InvalidAggregateFunction(s.to_string()))
    }
}

/// Aggregate SQL expression for one output column.
pub fn aggregate_expression(column_name: &str, spec: &AggregateSpec) -> MapResult<String> {
    if let Some(expression) = &spec.aggregate_expression {
        return Ok(expression.clone());
    }
    let function = match &spec.aggregate_function {
        Some(name) => name.parse::<AggregateFunction>()?,
        None => AggregateFunction::Count,
    };
    Ok(function.sql(column_name, spec.aggregated_column.as_deref()))
}

/// Output columns with the feature count column first.
///
/// A caller-defined `_cdb_feature_count` replaces the default one.
pub fn aggregate_columns(columns: &BTreeMap<String, AggregateSpec>) -> Vec<(&str, AggregateSpec)> {
    let feature_count = columns
        .get(FEATURE_COUNT_COLUMN)
        .cloned()
        .unwrap_or_else(|| AggregateSpec::function("count", "*"));

    let mut result = vec![(FEATURE_COUNT_COLUMN, feature_count)];
    result.extend(
        columns
            .iter()
            .filter(|(name, _)| name.as_str() != FEATURE_COUNT_COLUMN)
            .map(|(name, spec)| (name.as_str(), spec.clone())),
    );
    result
}

/// `<expression> AS <name>` definitions for every output column.
pub fn aggregate_column_defs(columns: &BTreeMap<String, AggregateSpec>) -> MapResult<Vec<String>> {
    aggregate_columns(columns)
        .iter()
        .map(|(name, spec)| {
            Ok::<_, MapError>(format!("{} AS {}", aggregate_expression(name, spec)?, name))
        })
        .collect()
}

/// Output column names, optionally qualified with `table`.
pub fn aggregate_column_names(
    columns: &BTreeMap<String, AggregateSpec>,
    table: Option<&str>,
) -> Vec<String> {
    aggregate_columns(columns)
        .iter()
        .map(|(name, _)| match table {
            Some(table) => format!("{}.{}", table, name),
            None => name.to_string(),
        })
        .collect()
}

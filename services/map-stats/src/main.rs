//! Map statistics tool.
//!
//! Reads a map config document and reports, per layer:
//! - The aggregation query a renderer would run for it
//! - The `meta.stats` block collected from PostGIS

mod config;
mod report;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use layer_stats::{CollectorSelector, LayerStatsCoordinator, PgDbConnection};
use map_common::tokens::MAX_ZOOM;
use map_common::MapConfig;

#[derive(Parser, Debug)]
#[command(name = "map-stats")]
#[command(about = "Aggregation SQL and layer statistics for map configs")]
struct Args {
    /// Map config document (JSON)
    #[arg(short, long)]
    mapconfig: PathBuf,

    /// PostgreSQL URL; layer stats are collected when set
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Layer stats collectors to run (ALL, mapnik, torque)
    #[arg(long, env = "MAP_STATS_SELECTOR", default_value = "ALL")]
    selector: CollectorSelector,

    /// Generate aggregation SQL for every mapnik/cartodb layer
    #[arg(long)]
    aggregate: bool,

    /// Replace substitution tokens in aggregation SQL for this zoom
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=MAX_ZOOM as i64))]
    zoom: Option<u32>,

    /// Maximum database connections
    #[arg(long, default_value = "4")]
    max_connections: u32,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout only carries the report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if !args.aggregate && args.database_url.is_none() {
        bail!("Nothing to do: pass --aggregate and/or --database-url");
    }

    let map_config = config::load_map_config(&args.mapconfig)?;
    let layer_count = map_config.layers().len();

    let mut aggregations = Vec::with_capacity(layer_count);
    if args.aggregate {
        for index in 0..layer_count {
            aggregations.push(report::aggregation_for(&map_config, index, args.zoom)?);
        }
    }

    let stats = match &args.database_url {
        Some(url) => {
            info!(selector = %args.selector, "Collecting layer stats");
            let db = PgDbConnection::connect(url, args.max_connections).await?;
            let coordinator = LayerStatsCoordinator::from_selector(args.selector);
            Some(coordinator.get_stats(&map_config, &db).await?)
        }
        None => None,
    };

    let report = report::build_report(&map_config, aggregations, stats);
    let output = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);

    info!(layers = layer_count, "Map report complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_range() {
        let args = Args::try_parse_from(["map-stats", "-m", "map.json", "-z", "30"]).unwrap();
        assert_eq!(args.zoom, Some(30));

        assert!(Args::try_parse_from(["map-stats", "-m", "map.json", "-z", "31"]).is_err());
        assert!(Args::try_parse_from(["map-stats", "-m", "map.json", "-z", "4294967295"]).is_err());
    }
}

//! Read-side queries exposed to the dashboard boundary.

use std::time::Duration;

use marketpipe_core::{AssetId, PipelineConfig};
use serde::Serialize;

use crate::error::CliError;

use super::open_warehouse;

pub fn latest(pretty: bool) -> Result<(), CliError> {
    let warehouse = open_warehouse(&PipelineConfig::from_env()?)?;
    render(&warehouse.latest_snapshot()?, pretty)
}

pub fn history(hours: u64, pretty: bool) -> Result<(), CliError> {
    let warehouse = open_warehouse(&PipelineConfig::from_env()?)?;
    let rows = warehouse.history(Duration::from_secs(hours.saturating_mul(3_600)))?;
    render(&rows, pretty)
}

pub fn top(n: usize, pretty: bool) -> Result<(), CliError> {
    let warehouse = open_warehouse(&PipelineConfig::from_env()?)?;
    render(&warehouse.top_n(n)?, pretty)
}

pub fn bars(asset_id: &str, limit: usize, pretty: bool) -> Result<(), CliError> {
    let asset = AssetId::parse(asset_id)?;
    let warehouse = open_warehouse(&PipelineConfig::from_env()?)?;
    render(&warehouse.asset_history(asset.as_str(), limit)?, pretty)
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

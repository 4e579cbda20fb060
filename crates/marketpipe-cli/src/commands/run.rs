use std::sync::Arc;

use marketpipe_core::{
    MarketClient, OhlcFlow, PipelineConfig, ReqwestHttpClient, SnapshotFlow,
};
use tracing::info;

use crate::cli::FlowKind;
use crate::error::CliError;

use super::open_warehouse;

pub async fn run(flow: FlowKind) -> Result<(), CliError> {
    let config = PipelineConfig::from_env()?;
    let warehouse = open_warehouse(&config)?;
    let client = MarketClient::new(config.client.clone(), Arc::new(ReqwestHttpClient::new()));

    if matches!(flow, FlowKind::Snapshot | FlowKind::All) {
        let snapshot = SnapshotFlow::new(
            client.clone(),
            warehouse.clone(),
            config.snapshot_policies.clone(),
        );
        let outcome = snapshot.run().await?;
        info!(rows = outcome.report.rows_loaded, "snapshot flow finished");
        println!("{}", serde_json::to_string(&outcome.report)?);
    }

    if matches!(flow, FlowKind::Ohlc | FlowKind::All) {
        let ohlc = OhlcFlow::new(
            client,
            warehouse,
            config.ohlc_policies.clone(),
            config.ohlc_days,
            config.max_rank,
        );
        let outcome = ohlc.run().await?;
        info!(rows = outcome.report.rows_loaded, "ohlc flow finished");
        println!("{}", serde_json::to_string(&outcome.report)?);
    }

    Ok(())
}

mod query;
mod run;

use marketpipe_core::PipelineConfig;
use marketpipe_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Run { flow } => run::run(*flow).await,
        Command::Latest => query::latest(cli.pretty),
        Command::History { hours } => query::history(*hours, cli.pretty),
        Command::Top { n } => query::top(*n, cli.pretty),
        Command::Bars { asset_id, limit } => query::bars(asset_id, *limit, cli.pretty),
    }
}

/// Open the warehouse at the configured (or default) location.
pub(crate) fn open_warehouse(config: &PipelineConfig) -> Result<Warehouse, CliError> {
    let mut warehouse_config = WarehouseConfig::default();
    if let Some(path) = &config.db_path {
        warehouse_config.db_path = path.clone();
    }
    Ok(Warehouse::open(warehouse_config)?)
}

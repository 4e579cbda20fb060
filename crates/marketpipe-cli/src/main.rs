mod cli;
mod commands;
mod error;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let _ = tracing::subscriber::set_global_default(FmtSubscriber::default());

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    commands::run(&cli).await?;
    Ok(ExitCode::SUCCESS)
}

//! CLI argument definitions for marketpipe.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Run the ETL pipelines (snapshot, ohlc, or both) |
//! | `latest` | Latest snapshot row per asset |
//! | `history` | Snapshot rows within a trailing window |
//! | `top` | Best-ranked assets from the latest snapshot |
//! | `bars` | OHLC candles for one asset |
//!
//! # Examples
//!
//! ```bash
//! # Run both pipelines
//! marketpipe run
//!
//! # Run only the candle pipeline
//! marketpipe run ohlc
//!
//! # Read-side queries for the dashboard boundary
//! marketpipe latest --pretty
//! marketpipe history --hours 48
//! marketpipe top 10
//! marketpipe bars bitcoin --limit 50
//! ```

use clap::{Parser, Subcommand, ValueEnum};

/// Crypto market data ETL: pull snapshots and OHLC candles from the
/// provider, validate them, and persist them for the dashboard.
#[derive(Debug, Parser)]
#[command(
    name = "marketpipe",
    author,
    version,
    about = "Crypto market data ETL pipeline"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the ETL pipelines; exit status reports run success.
    Run {
        /// Which flow(s) to run.
        #[arg(value_enum, default_value_t = FlowKind::All)]
        flow: FlowKind,
    },
    /// Latest snapshot row per asset, rank ascending with nulls last.
    Latest,
    /// Snapshot rows collected within the trailing window, newest first.
    History {
        /// Window size in hours.
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },
    /// The N best-ranked assets from the latest snapshot.
    Top {
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// OHLC candles for one asset, newest bucket first.
    Bars {
        asset_id: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlowKind {
    Snapshot,
    Ohlc,
    All,
}

//! # Marketpipe Warehouse
//!
//! DuckDB-based storage layer for the market data pipeline.
//!
//! ## Overview
//!
//! Two append-only fact tables (`asset_quotes`, `ohlc_bars`) are written by
//! the pipeline's Load step and never updated in place. Candle duplicates
//! are tolerated at write time and removed by the deduplication pass;
//! snapshot freshness is computed by a ranking query, not enforced by a
//! constraint. Per-asset views are rebuildable projections with no state of
//! their own.
//!
//! ## Security
//!
//! All API-sourced values are passed through parameterized statements. The
//! only interpolated identifier is the per-asset view name, which is derived
//! from a charset-validated asset id.

pub mod duckdb;
pub mod migrations;
mod models;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::duckdb::{Connection, ToSql};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};
pub use models::{BarRecord, OhlcRow, QuoteRecord, SnapshotRow};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Asset id is not usable as a view identifier.
    #[error("asset id '{value}' is not a valid identifier")]
    InvalidAssetId { value: String },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
    /// Idle lifetime after which pooled connections are reopened.
    pub recycle_after: Duration,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_marketpipe_home().join("marketpipe.duckdb"),
            max_pool_size: 4,
            recycle_after: Duration::from_secs(300),
        }
    }
}

/// The main warehouse interface for pipeline storage and read-side queries.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration and ensure the
    /// schema exists.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(
            config.db_path.clone(),
            config.max_pool_size,
            config.recycle_after,
        );
        let warehouse = Self { manager };
        warehouse.ensure_schema()?;
        Ok(warehouse)
    }

    /// Idempotently create tables, sequences, and indexes. Running this N
    /// times has the same effect as running it once; existing data is never
    /// touched.
    pub fn ensure_schema(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Append snapshot rows as one transaction. Pure insert: nothing is
    /// updated or deleted, and a failure rolls back the whole batch.
    pub fn append_quotes(&self, rows: &[QuoteRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                let params: [&dyn ToSql; 8] = [
                    &row.asset_id,
                    &row.symbol,
                    &row.name,
                    &row.image,
                    &row.current_price,
                    &row.market_cap,
                    &row.market_cap_rank,
                    &row.collected_at,
                ];
                connection.execute(
                    "INSERT INTO asset_quotes \
                     (asset_id, symbol, name, image, current_price, market_cap, market_cap_rank, collected_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, TRY_CAST(? AS TIMESTAMPTZ))",
                    params.as_slice(),
                )?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Append candle rows as one transaction; same atomicity contract as
    /// [`Warehouse::append_quotes`]. Duplicate (asset, bucket) rows are
    /// accepted here and cleaned up by [`Warehouse::dedupe_bars`].
    pub fn append_bars(&self, rows: &[BarRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                let params: [&dyn ToSql; 6] = [
                    &row.asset_id,
                    &row.bucket_ts,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                ];
                connection.execute(
                    "INSERT INTO ohlc_bars \
                     (asset_id, bucket_ts, open, high, low, close) \
                     VALUES (?, TRY_CAST(? AS TIMESTAMPTZ), ?, ?, ?, ?)",
                    params.as_slice(),
                )?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Remove all but one row per (asset_id, bucket_ts) duplicate group.
    ///
    /// The survivor is the row with the lowest `ingest_id`, so repeated runs
    /// converge on the same result and a clean table is a no-op. Returns the
    /// number of rows deleted.
    pub fn dedupe_bars(&self) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let deleted = connection.execute(
            "DELETE FROM ohlc_bars \
             WHERE ingest_id NOT IN ( \
                 SELECT MIN(ingest_id) FROM ohlc_bars GROUP BY asset_id, bucket_ts \
             )",
            [],
        )?;
        Ok(deleted)
    }

    /// Rebuild the per-asset view for one asset. See [`views::rebuild_asset_view`].
    pub fn rebuild_asset_view(&self, asset_id: &str) -> Result<String, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        views::rebuild_asset_view(&connection, asset_id)
    }

    /// The freshest snapshot row per asset: maximum `collected_at`, ties
    /// broken by the latest ingest. Ordered by rank ascending with nulls
    /// last, then symbol.
    pub fn latest_snapshot(&self) -> Result<Vec<SnapshotRow>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "WITH ranked AS ( \
                 SELECT asset_id, symbol, name, image, current_price, market_cap, \
                        market_cap_rank, collected_at, \
                        ROW_NUMBER() OVER ( \
                            PARTITION BY asset_id \
                            ORDER BY collected_at DESC, ingest_id DESC \
                        ) AS rn \
                 FROM asset_quotes \
             ) \
             SELECT asset_id, symbol, name, image, current_price, market_cap, \
                    market_cap_rank, CAST(collected_at AS VARCHAR) \
             FROM ranked WHERE rn = 1 \
             ORDER BY market_cap_rank ASC NULLS LAST, symbol ASC",
        )?;
        let rows = statement
            .query_map([], snapshot_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All snapshot rows collected within the trailing window, newest first,
    /// rank ascending within one collection instant.
    pub fn history(&self, window: Duration) -> Result<Vec<SnapshotRow>, WarehouseError> {
        let cutoff = (OffsetDateTime::now_utc() - window)
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"));

        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT asset_id, symbol, name, image, current_price, market_cap, \
                    market_cap_rank, CAST(collected_at AS VARCHAR) \
             FROM asset_quotes \
             WHERE collected_at >= TRY_CAST(? AS TIMESTAMPTZ) \
             ORDER BY collected_at DESC, market_cap_rank ASC NULLS LAST",
        )?;
        let params: [&dyn ToSql; 1] = [&cutoff];
        let rows = statement
            .query_map(params.as_slice(), snapshot_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The `n` best-ranked assets from the latest snapshot, rank ascending.
    /// Assets with no rank are excluded.
    pub fn top_n(&self, n: usize) -> Result<Vec<SnapshotRow>, WarehouseError> {
        let limit = n as i64;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "WITH ranked AS ( \
                 SELECT asset_id, symbol, name, image, current_price, market_cap, \
                        market_cap_rank, collected_at, \
                        ROW_NUMBER() OVER ( \
                            PARTITION BY asset_id \
                            ORDER BY collected_at DESC, ingest_id DESC \
                        ) AS rn \
                 FROM asset_quotes \
             ) \
             SELECT asset_id, symbol, name, image, current_price, market_cap, \
                    market_cap_rank, CAST(collected_at AS VARCHAR) \
             FROM ranked \
             WHERE rn = 1 AND market_cap_rank IS NOT NULL \
             ORDER BY market_cap_rank ASC \
             LIMIT ?",
        )?;
        let params: [&dyn ToSql; 1] = [&limit];
        let rows = statement
            .query_map(params.as_slice(), snapshot_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Candles for one asset, newest bucket first.
    pub fn asset_history(
        &self,
        asset_id: &str,
        limit: usize,
    ) -> Result<Vec<OhlcRow>, WarehouseError> {
        let limit = limit as i64;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT asset_id, CAST(bucket_ts AS VARCHAR), open, high, low, close \
             FROM ohlc_bars WHERE asset_id = ? \
             ORDER BY bucket_ts DESC LIMIT ?",
        )?;
        let params: [&dyn ToSql; 2] = [&asset_id, &limit];
        let rows = statement
            .query_map(params.as_slice(), |row| {
                Ok(OhlcRow {
                    asset_id: row.get(0)?,
                    bucket_ts: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct asset ids ever seen with a market cap rank below `max_rank`.
    /// Feeds the OHLC universe when no fixed id list is configured.
    pub fn tracked_assets(&self, max_rank: u32) -> Result<Vec<String>, WarehouseError> {
        let max_rank = i64::from(max_rank);
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT DISTINCT asset_id FROM asset_quotes \
             WHERE market_cap_rank IS NOT NULL AND market_cap_rank < ? \
             ORDER BY asset_id",
        )?;
        let params: [&dyn ToSql; 1] = [&max_rank];
        let rows = statement
            .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total rows in the candle table; used by step reporting.
    pub fn bar_count(&self) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM ohlc_bars", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn snapshot_row(row: &::duckdb::Row<'_>) -> Result<SnapshotRow, ::duckdb::Error> {
    Ok(SnapshotRow {
        asset_id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        current_price: row.get(4)?,
        market_cap: row.get(5)?,
        market_cap_rank: row.get(6)?,
        collected_at: row.get(7)?,
    })
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the marketpipe home directory from environment or default.
fn resolve_marketpipe_home() -> PathBuf {
    if let Some(path) = env::var_os("MARKETPIPE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".marketpipe");
    }

    PathBuf::from(".marketpipe")
}

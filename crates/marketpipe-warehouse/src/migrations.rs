use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

// Both fact tables are append-only by design: no primary keys, no unique
// constraints. Snapshot freshness is computed by ranking; candle uniqueness
// is restored by the deduplication pass keyed on (asset_id, bucket_ts).
// The ingest_id sequences make the dedup survivor deterministic.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_core_tables",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS seq_quote_ingest START 1;
CREATE SEQUENCE IF NOT EXISTS seq_ohlc_ingest START 1;

CREATE TABLE IF NOT EXISTS asset_quotes (
    ingest_id BIGINT NOT NULL DEFAULT nextval('seq_quote_ingest'),
    asset_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    image TEXT,
    current_price DOUBLE NOT NULL,
    market_cap DOUBLE NOT NULL,
    market_cap_rank INTEGER,
    collected_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS ohlc_bars (
    ingest_id BIGINT NOT NULL DEFAULT nextval('seq_ohlc_ingest'),
    asset_id TEXT NOT NULL,
    bucket_ts TIMESTAMPTZ NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_asset_quotes_asset_collected ON asset_quotes(asset_id, collected_at);
CREATE INDEX IF NOT EXISTS idx_asset_quotes_rank ON asset_quotes(market_cap_rank);
CREATE INDEX IF NOT EXISTS idx_ohlc_bars_asset_bucket ON ohlc_bars(asset_id, bucket_ts);
"#,
    },
];

/// Apply any migrations not yet recorded in the `schema_migrations` ledger.
/// Safe to run on every pipeline start; never destroys existing data.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let query = format!(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = '{}'",
            escape_sql_string(migration.version)
        );
        let applied_count: i64 = connection.query_row(query.as_str(), [], |row| row.get(0))?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            let insert = format!(
                "INSERT INTO schema_migrations (version) VALUES ('{}')",
                escape_sql_string(migration.version)
            );
            connection.execute_batch(insert.as_str())?;
        }
    }

    Ok(())
}

pub(crate) fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

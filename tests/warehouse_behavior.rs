//! Behavior tests for the warehouse: deduplication, ranking queries, and
//! per-asset views, focusing on user-visible outcomes.

use std::time::Duration;

use marketpipe_tests::open_temp_warehouse;
use marketpipe_warehouse::{BarRecord, QuoteRecord};

fn quote(asset_id: &str, rank: Option<i64>, price: f64, collected_at: &str) -> QuoteRecord {
    QuoteRecord {
        asset_id: asset_id.to_string(),
        symbol: asset_id.chars().take(4).collect(),
        name: asset_id.to_string(),
        image: None,
        current_price: price,
        market_cap: price * 1_000.0,
        market_cap_rank: rank,
        collected_at: collected_at.to_string(),
    }
}

fn bar(asset_id: &str, bucket_ts: &str, open: f64, high: f64, low: f64, close: f64) -> BarRecord {
    BarRecord {
        asset_id: asset_id.to_string(),
        bucket_ts: bucket_ts.to_string(),
        open,
        high,
        low,
        close,
    }
}

// =============================================================================
// Deduplication
// =============================================================================

#[test]
fn when_the_same_bar_is_appended_twice_dedupe_leaves_one_unchanged_row() {
    // Given: The same candle loaded twice (e.g. two overlapping runs)
    let (_temp, warehouse) = open_temp_warehouse();
    let candle = bar("bitcoin", "2024-06-01T00:00:00Z", 49.0, 52.0, 48.0, 50.0);
    warehouse.append_bars(&[candle.clone()]).expect("first append");
    warehouse.append_bars(&[candle]).expect("second append");

    // When: The deduplication pass runs
    let removed = warehouse.dedupe_bars().expect("dedupe");

    // Then: One row survives with the original OHLC values intact
    assert_eq!(removed, 1);
    let rows = warehouse.asset_history("bitcoin", 10).expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        (rows[0].open, rows[0].high, rows[0].low, rows[0].close),
        (49.0, 52.0, 48.0, 50.0)
    );
}

#[test]
fn dedupe_twice_yields_the_same_row_count_as_dedupe_once() {
    let (_temp, warehouse) = open_temp_warehouse();
    warehouse
        .append_bars(&[
            bar("bitcoin", "2024-06-01T00:00:00Z", 1.0, 3.0, 0.5, 2.0),
            bar("bitcoin", "2024-06-01T00:00:00Z", 9.0, 9.5, 8.0, 9.2),
            bar("bitcoin", "2024-06-01T04:00:00Z", 2.0, 4.0, 1.5, 3.0),
            bar("ethereum", "2024-06-01T00:00:00Z", 5.0, 6.0, 4.0, 5.5),
        ])
        .expect("append");

    warehouse.dedupe_bars().expect("first pass");
    let after_first = warehouse.bar_count().expect("count");

    let removed_again = warehouse.dedupe_bars().expect("second pass");
    let after_second = warehouse.bar_count().expect("count");

    assert_eq!(removed_again, 0);
    assert_eq!(after_first, after_second);
    assert_eq!(after_first, 3, "one row per (asset, bucket) group");
}

#[test]
fn dedupe_survivor_is_deterministic_across_runs() {
    // The earliest-ingested row of each group wins, every time.
    let (_temp, warehouse) = open_temp_warehouse();
    warehouse
        .append_bars(&[bar("bitcoin", "2024-06-01T00:00:00Z", 1.0, 3.0, 0.5, 2.0)])
        .expect("append original");
    warehouse
        .append_bars(&[bar("bitcoin", "2024-06-01T00:00:00Z", 9.0, 9.5, 8.0, 9.2)])
        .expect("append duplicate");

    warehouse.dedupe_bars().expect("dedupe");

    let rows = warehouse.asset_history("bitcoin", 10).expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, 2.0, "first-ingested row survives");
}

// =============================================================================
// Ranking queries
// =============================================================================

#[test]
fn latest_snapshot_returns_one_row_per_asset_with_max_collected_at() {
    let (_temp, warehouse) = open_temp_warehouse();
    warehouse
        .append_quotes(&[
            quote("bitcoin", Some(1), 100.0, "2024-06-01T00:00:00Z"),
            quote("bitcoin", Some(1), 110.0, "2024-06-01T06:00:00Z"),
            quote("bitcoin", Some(1), 105.0, "2024-06-01T03:00:00Z"),
            quote("ethereum", Some(2), 10.0, "2024-06-01T00:00:00Z"),
        ])
        .expect("append");

    let latest = warehouse.latest_snapshot().expect("query");

    assert_eq!(latest.len(), 2, "exactly one row per distinct asset id");
    let bitcoin = latest
        .iter()
        .find(|row| row.asset_id == "bitcoin")
        .expect("bitcoin present");
    assert_eq!(bitcoin.current_price, 110.0, "freshest snapshot wins");
}

#[test]
fn top_5_on_ranks_with_a_null_returns_ranks_one_through_five_ascending() {
    // Ranks [1, 2, 3, null, 4, 5, 6] -> 1,2,3,4,5 with the null excluded.
    let (_temp, warehouse) = open_temp_warehouse();
    let fixtures = [
        ("alpha", Some(1)),
        ("bravo", Some(2)),
        ("charlie", Some(3)),
        ("nullco", None),
        ("delta", Some(4)),
        ("echo", Some(5)),
        ("foxtrot", Some(6)),
    ];
    let rows: Vec<QuoteRecord> = fixtures
        .iter()
        .map(|(id, rank)| quote(id, *rank, 1.0, "2024-06-01T00:00:00Z"))
        .collect();
    warehouse.append_quotes(&rows).expect("append");

    let top = warehouse.top_n(5).expect("query");

    let ranks: Vec<i64> = top
        .iter()
        .map(|row| row.market_cap_rank.expect("rank present"))
        .collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    assert!(!top.iter().any(|row| row.asset_id == "nullco"));
}

#[test]
fn history_window_excludes_older_rows_and_sorts_newest_first() {
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    let (_temp, warehouse) = open_temp_warehouse();
    let now = OffsetDateTime::now_utc();
    let fmt = |secs_ago: u64| {
        (now - Duration::from_secs(secs_ago))
            .format(&Rfc3339)
            .expect("format")
    };

    warehouse
        .append_quotes(&[
            quote("bitcoin", Some(1), 90.0, fmt(3 * 24 * 3_600).as_str()),
            quote("bitcoin", Some(1), 100.0, fmt(2 * 3_600).as_str()),
            quote("bitcoin", Some(1), 110.0, fmt(60).as_str()),
        ])
        .expect("append");

    let rows = warehouse
        .history(Duration::from_secs(24 * 3_600))
        .expect("query");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].current_price, 110.0, "newest first");
    assert_eq!(rows[1].current_price, 100.0);
}

// =============================================================================
// Per-asset views
// =============================================================================

#[test]
fn rebuilding_a_view_twice_produces_an_identical_row_set() {
    let (_temp, warehouse) = open_temp_warehouse();
    warehouse
        .append_bars(&[
            bar("matic-network", "2024-06-01T00:00:00Z", 1.0, 1.2, 0.9, 1.1),
            bar("matic-network", "2024-06-01T04:00:00Z", 1.1, 1.3, 1.0, 1.2),
            bar("bitcoin", "2024-06-01T00:00:00Z", 50.0, 51.0, 49.0, 50.5),
        ])
        .expect("append");

    let name = warehouse
        .rebuild_asset_view("matic-network")
        .expect("first rebuild");
    warehouse
        .rebuild_asset_view("matic-network")
        .expect("second rebuild");

    let connection =
        duckdb::Connection::open(warehouse.db_path()).expect("verification connection");
    let count: i64 = connection
        .query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))
        .expect("view query");
    assert_eq!(count, 2, "only the one asset's candles are visible");
}

#[test]
fn rebuilding_a_view_before_any_rows_exist_is_valid_and_empty() {
    let (_temp, warehouse) = open_temp_warehouse();

    let name = warehouse
        .rebuild_asset_view("solana")
        .expect("empty view is valid");

    let connection =
        duckdb::Connection::open(warehouse.db_path()).expect("verification connection");
    let count: i64 = connection
        .query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))
        .expect("view query");
    assert_eq!(count, 0);
}

#[test]
fn view_rebuild_rejects_asset_ids_outside_the_identifier_charset() {
    let (_temp, warehouse) = open_temp_warehouse();

    warehouse
        .rebuild_asset_view("bitcoin'; DROP TABLE ohlc_bars; --")
        .expect_err("injection-shaped id must be rejected");

    // The candle table is still intact.
    assert_eq!(warehouse.bar_count().expect("count"), 0);
}

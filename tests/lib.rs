// Shared fixtures for the behavioral test suites.

use std::time::Duration;

use serde_json::{json, Value};

pub use marketpipe_core::{
    AssetId, ClientConfig, FlowPolicies, HttpResponse, MarketClient, OhlcFlow, ScriptedHttpClient,
    SnapshotFlow, StepPolicy,
};
pub use marketpipe_warehouse::{Warehouse, WarehouseConfig};
pub use std::sync::Arc;

/// A client config with millisecond pacing/cooldown so suites run quickly.
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        pacing: Duration::from_millis(1),
        cooldown: Duration::from_millis(5),
        ..ClientConfig::default()
    }
}

/// Flow policies with millisecond retry delays and tight timeouts.
pub fn fast_policies() -> FlowPolicies {
    let quick = StepPolicy::fixed(1, Duration::from_millis(1), Duration::from_secs(10));
    FlowPolicies {
        ensure_schema: quick.clone(),
        extract: quick.clone(),
        transform: StepPolicy::no_retry(Duration::from_secs(10)),
        load: quick.clone(),
        dedupe: quick.clone(),
        rebuild_views: quick,
    }
}

/// Open a warehouse backed by a fresh temp directory.
pub fn open_temp_warehouse() -> (tempfile::TempDir, Warehouse) {
    let temp = tempfile::tempdir().expect("tempdir");
    let warehouse = Warehouse::open(WarehouseConfig {
        db_path: temp.path().join("marketpipe.duckdb"),
        max_pool_size: 2,
        recycle_after: Duration::from_secs(300),
    })
    .expect("warehouse open");
    (temp, warehouse)
}

/// One raw snapshot record the way the provider serializes it.
pub fn snapshot_record(id: &str, rank: Option<u32>, price: f64) -> Value {
    json!({
        "id": id,
        "symbol": id.chars().take(3).collect::<String>(),
        "name": id,
        "image": format!("https://img.test/{id}.png"),
        "current_price": price,
        "market_cap": price * 1_000.0,
        "market_cap_rank": rank,
        "price_change_percentage_24h": 1.5,
    })
}

/// Serialize raw snapshot records into a provider response body.
pub fn snapshot_body(records: &[Value]) -> String {
    serde_json::to_string(records).expect("snapshot body serializes")
}

/// A provider OHLC body with hourly candles starting at `start_ms`.
pub fn ohlc_body(start_ms: i64, count: usize) -> String {
    let candles: Vec<Value> = (0..count)
        .map(|index| {
            let ts = start_ms + (index as i64) * 3_600_000;
            let base = 100.0 + index as f64;
            json!([ts, base, base + 2.0, base - 2.0, base + 1.0])
        })
        .collect();
    serde_json::to_string(&candles).expect("ohlc body serializes")
}

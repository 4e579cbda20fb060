use serde::Serialize;

/// A snapshot row for ingestion. Timestamps travel as RFC3339 strings and
/// are cast by the store.
#[derive(Debug, Clone)]
pub struct QuoteRecord {
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: Option<i64>,
    /// Collection timestamp as RFC3339 UTC.
    pub collected_at: String,
}

/// An OHLC candle row for ingestion.
#[derive(Debug, Clone)]
pub struct BarRecord {
    pub asset_id: String,
    /// Candle open time as RFC3339 UTC.
    pub bucket_ts: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A snapshot row as returned by the read-side queries.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: Option<i64>,
    pub collected_at: String,
}

/// An OHLC candle as returned by the read-side queries.
#[derive(Debug, Clone, Serialize)]
pub struct OhlcRow {
    pub asset_id: String,
    pub bucket_ts: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

//! Validation and reshaping of raw provider records.
//!
//! Both transforms fail fast on empty input: an empty extraction is an
//! upstream anomaly, not "zero new rows". Individual rows that fail
//! validation are excluded and reported with their offending payload;
//! one bad row never aborts the batch.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::domain::{AssetId, AssetQuote, OhlcBar, RawBar, UtcDateTime};
use crate::ValidationError;

const PAYLOAD_PREVIEW_LEN: usize = 240;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no data received from the market API")]
    NoData,
}

/// A rejected input row together with why and what it contained.
#[derive(Debug, Clone)]
pub struct RowError {
    pub index: usize,
    pub reason: ValidationError,
    pub payload: String,
}

/// Validated snapshot rows plus the rejects; all rows share one
/// batch-level `collected_at`.
#[derive(Debug, Clone)]
pub struct SnapshotBatch {
    pub rows: Vec<AssetQuote>,
    pub rejected: Vec<RowError>,
    pub collected_at: UtcDateTime,
}

/// Validated OHLC rows plus the rejects.
#[derive(Debug, Clone)]
pub struct OhlcBatch {
    pub rows: Vec<OhlcBar>,
    pub rejected: Vec<RowError>,
}

/// Validate raw snapshot records into [`AssetQuote`] rows.
///
/// Recognized fields are projected, unknown fields dropped, missing
/// optional fields become null. The collection timestamp is captured once
/// for the whole batch. Output ordering is unspecified.
pub fn transform_snapshot(raw: &[Value]) -> Result<SnapshotBatch, TransformError> {
    if raw.is_empty() {
        return Err(TransformError::NoData);
    }

    let collected_at = UtcDateTime::now();
    let mut rows = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for (index, record) in raw.iter().enumerate() {
        match snapshot_row(record, collected_at) {
            Ok(quote) => rows.push(quote),
            Err(reason) => {
                let payload = preview(record);
                warn!(index, %reason, payload = %payload, "snapshot row failed validation");
                rejected.push(RowError {
                    index,
                    reason,
                    payload,
                });
            }
        }
    }

    Ok(SnapshotBatch {
        rows,
        rejected,
        collected_at,
    })
}

/// Validate raw candles into [`OhlcBar`] rows.
pub fn transform_ohlc(raw: &[RawBar]) -> Result<OhlcBatch, TransformError> {
    if raw.is_empty() {
        return Err(TransformError::NoData);
    }

    let mut rows = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for (index, bar) in raw.iter().enumerate() {
        match ohlc_row(bar) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                let payload = format!("{bar:?}");
                warn!(index, %reason, payload = %payload, "ohlc row failed validation");
                rejected.push(RowError {
                    index,
                    reason,
                    payload,
                });
            }
        }
    }

    Ok(OhlcBatch { rows, rejected })
}

fn snapshot_row(record: &Value, collected_at: UtcDateTime) -> Result<AssetQuote, ValidationError> {
    let asset_id = AssetId::parse(require_str(record, "id")?)?;
    let symbol = require_str(record, "symbol")?;
    let name = require_str(record, "name")?;
    let image = optional_str(record, "image");
    let current_price = require_f64(record, "current_price")?;
    let market_cap = require_f64(record, "market_cap")?;
    let market_cap_rank = optional_rank(record, "market_cap_rank")?;

    AssetQuote::new(
        asset_id,
        symbol,
        name,
        image,
        current_price,
        market_cap,
        market_cap_rank,
        collected_at,
    )
}

fn ohlc_row(bar: &RawBar) -> Result<OhlcBar, ValidationError> {
    let bucket_ts = UtcDateTime::from_unix_millis(bar.timestamp_ms)?;
    OhlcBar::new(
        bar.asset_id.clone(),
        bucket_ts,
        bar.open,
        bar.high,
        bar.low,
        bar.close,
    )
}

fn require_str<'a>(record: &'a Value, field: &'static str) -> Result<&'a str, ValidationError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ValidationError::ExpectedString { field }),
    }
}

fn optional_str(record: &Value, field: &str) -> Option<String> {
    match record.get(field) {
        Some(Value::String(value)) => Some(value.clone()),
        _ => None,
    }
}

fn require_f64(record: &Value, field: &'static str) -> Result<f64, ValidationError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(Value::Number(value)) => value
            .as_f64()
            .ok_or(ValidationError::ExpectedNumber { field }),
        Some(_) => Err(ValidationError::ExpectedNumber { field }),
    }
}

fn optional_rank(record: &Value, field: &'static str) -> Result<Option<u32>, ValidationError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(value)) => {
            let rank = value
                .as_i64()
                .ok_or(ValidationError::ExpectedNumber { field })?;
            let rank =
                u32::try_from(rank).map_err(|_| ValidationError::InvalidRank { value: rank })?;
            Ok(Some(rank))
        }
        Some(_) => Err(ValidationError::ExpectedNumber { field }),
    }
}

fn preview(record: &Value) -> String {
    let mut rendered = record.to_string();
    if rendered.len() > PAYLOAD_PREVIEW_LEN {
        rendered.truncate(PAYLOAD_PREVIEW_LEN);
        rendered.push_str("...");
    }
    rendered
}

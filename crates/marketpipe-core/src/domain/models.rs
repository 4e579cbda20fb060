use serde::{Deserialize, Serialize};

use crate::{AssetId, UtcDateTime, ValidationError};

/// One validated snapshot row: summary market data for a single asset at a
/// single collection instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    pub asset_id: AssetId,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: Option<u32>,
    pub collected_at: UtcDateTime,
}

impl AssetQuote {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asset_id: AssetId,
        symbol: impl Into<String>,
        name: impl Into<String>,
        image: Option<String>,
        current_price: f64,
        market_cap: f64,
        market_cap_rank: Option<u32>,
        collected_at: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        let name = name.into();
        if symbol.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "symbol" });
        }
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        validate_finite("current_price", current_price)?;
        validate_non_negative("current_price", current_price)?;
        validate_finite("market_cap", market_cap)?;

        Ok(Self {
            asset_id,
            symbol,
            name,
            image,
            current_price,
            market_cap,
            market_cap_rank,
            collected_at,
        })
    }
}

/// One validated OHLC candle for an asset and time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub asset_id: AssetId,
    /// Candle open time (UTC).
    pub bucket_ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcBar {
    pub fn new(
        asset_id: AssetId,
        bucket_ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, ValidationError> {
        validate_finite("open", open)?;
        validate_finite("high", high)?;
        validate_finite("low", low)?;
        validate_finite("close", close)?;
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        Ok(Self {
            asset_id,
            bucket_ts,
            open,
            high,
            low,
            close,
        })
    }
}

/// Raw `[timestamp_ms, open, high, low, close]` tuple as returned by the
/// provider's OHLC endpoint.
pub type RawCandle = (i64, f64, f64, f64, f64);

/// A raw candle tagged with the asset it was fetched for, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub asset_id: AssetId,
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl RawBar {
    pub fn from_candle(asset_id: AssetId, candle: RawCandle) -> Self {
        let (timestamp_ms, open, high, low, close) = candle;
        Self {
            asset_id,
            timestamp_ms,
            open,
            high,
            low,
            close,
        }
    }
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

use thiserror::Error;

/// Validation and contract errors exposed by `marketpipe-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("asset id cannot be empty")]
    EmptyAssetId,
    #[error("asset id length {len} exceeds max {max}")]
    AssetIdTooLong { len: usize, max: usize },
    #[error("asset id contains invalid character '{ch}' at index {index}")]
    AssetIdInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp {millis}ms is outside the representable range")]
    TimestampOutOfRange { millis: i64 },

    #[error("field '{field}' is required")]
    MissingField { field: &'static str },
    #[error("field '{field}' must be a string")]
    ExpectedString { field: &'static str },
    #[error("field '{field}' must be numeric")]
    ExpectedNumber { field: &'static str },
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("market cap rank must be a non-negative integer, got {value}")]
    InvalidRank { value: i64 },

    #[error("candle high must be >= low")]
    InvalidBarRange,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

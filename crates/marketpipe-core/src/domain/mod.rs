//! Canonical domain types for marketpipe market data.
//!
//! All models validate their invariants at construction: prices are finite
//! and non-negative, candle ranges are ordered, timestamps are UTC, and
//! asset identifiers are charset-checked slugs. Anything that fails these
//! checks never enters the pipeline.

mod asset_id;
mod models;
mod timestamp;

pub use asset_id::AssetId;
pub use models::{AssetQuote, OhlcBar, RawBar, RawCandle};
pub use timestamp::UtcDateTime;

//! # Marketpipe Core
//!
//! Extraction, validation, and orchestration for the marketpipe ETL system.
//!
//! ## Overview
//!
//! This crate owns everything between the market data provider and the
//! warehouse:
//!
//! - **Canonical domain models** for snapshot quotes and OHLC candles
//! - **Market API client** with hard pacing, rate-limit cooldown, and
//!   per-asset skip-and-continue extraction
//! - **Validator/transformer** turning raw provider records into typed rows
//!   plus an explicit reject list
//! - **Step policies** (retry count, backoff, timeout) with a generic
//!   executor
//! - **Pipeline flows** sequencing schema, extract, transform, load,
//!   deduplicate, and view rebuild steps
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL'd response cache for the extract step |
//! | [`client`] | Market data provider client |
//! | [`config`] | Environment-sourced pipeline configuration |
//! | [`domain`] | Domain models (AssetQuote, OhlcBar, AssetId) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`pacing`] | Minimum-interval call pacing |
//! | [`pipeline`] | Flow orchestration and run reports |
//! | [`policy`] | Step retry/timeout/backoff policy |
//! | [`transform`] | Raw-record validation and reshaping |
//!
//! ## Error Handling
//!
//! Failures split into three classes: per-asset extraction problems are
//! skipped and counted, per-row validation problems are rejected and
//! reported, and everything else propagates as a [`pipeline::FlowError`]
//! that fails the run.

pub mod cache;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod pacing;
pub mod pipeline;
pub mod policy;
pub mod transform;

// Re-export commonly used types at crate root for convenience

// Domain models
pub use domain::{AssetId, AssetQuote, OhlcBar, RawBar, RawCandle, UtcDateTime};

// Error types
pub use error::{CoreError, ValidationError};

// Client
pub use client::{ClientConfig, ExtractReport, FetchError, MarketClient};

// Configuration
pub use config::{ConfigError, PipelineConfig};

// HTTP transport
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};

// Caching and pacing
pub use cache::CacheStore;
pub use pacing::Pacer;

// Step policy
pub use policy::{run_step, Backoff, StepError, StepPolicy};

// Pipeline flows
pub use pipeline::{
    FlowError, FlowPolicies, FlowReport, OhlcFlow, OhlcRun, SnapshotFlow, SnapshotRun, StepReport,
};

// Transform
pub use transform::{transform_ohlc, transform_snapshot, OhlcBatch, RowError, SnapshotBatch, TransformError};

// Warehouse (re-exported from marketpipe-warehouse)
pub use marketpipe_warehouse::{
    BarRecord, OhlcRow, QuoteRecord, SnapshotRow, Warehouse, WarehouseConfig, WarehouseError,
};

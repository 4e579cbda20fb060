//! Market data provider client.
//!
//! Wraps the provider's REST endpoints (markets snapshot, per-asset OHLC)
//! behind the [`HttpClient`] transport. The per-asset universe loop owns the
//! skip-and-continue policy: a rate limit, a delisted asset, or a transient
//! network failure costs one asset, never the batch. Task-level retries
//! belong to the flow's step policies, not to this loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::domain::{AssetId, RawBar, RawCandle};
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest};
use crate::pacing::Pacer;

/// Outcome classes for a single provider call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider rate limit hit (429)")]
    RateLimited,
    #[error("asset not found (404)")]
    NotFound,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("provider returned status {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<HttpError> for FetchError {
    fn from(error: HttpError) -> Self {
        match error.kind() {
            HttpErrorKind::Timeout => Self::Timeout(error.message().to_owned()),
            HttpErrorKind::Connect => Self::Connect(error.message().to_owned()),
            HttpErrorKind::Other => Self::Transport(error.message().to_owned()),
        }
    }
}

/// Client-side tunables; every value is supplied by configuration, nothing
/// is baked into the call sites.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Quote currency for all price fields.
    pub vs_currency: String,
    pub per_page: u32,
    pub page: u32,
    /// Fixed asset universe; empty means "discover from the warehouse".
    pub ids: Vec<AssetId>,
    pub api_key: Option<String>,
    /// Minimum delay between consecutive per-asset calls.
    pub pacing: Duration,
    /// Cool-down applied when the provider answers 429.
    pub cooldown: Duration,
    /// TTL for the extract-step response cache; zero disables caching.
    pub cache_ttl: Duration,
    pub http_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.coingecko.com/api/v3"),
            vs_currency: String::from("usd"),
            per_page: 100,
            page: 1,
            ids: Vec::new(),
            api_key: None,
            pacing: Duration::from_secs(6),
            cooldown: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(600),
            http_timeout_ms: 30_000,
        }
    }
}

/// Per-asset accounting for one universe extraction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractReport {
    pub requested: usize,
    pub fetched: usize,
    pub bars: usize,
    pub rate_limited: usize,
    pub not_found: usize,
    pub skipped: usize,
}

impl ExtractReport {
    fn new(requested: usize) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }
}

/// Rate-limit-aware client for the market data provider.
#[derive(Clone)]
pub struct MarketClient {
    http: Arc<dyn HttpClient>,
    cache: CacheStore,
    pacer: Pacer,
    config: ClientConfig,
}

impl MarketClient {
    pub fn new(config: ClientConfig, http: Arc<dyn HttpClient>) -> Self {
        let cache = if config.cache_ttl.is_zero() {
            CacheStore::disabled()
        } else {
            CacheStore::new(config.cache_ttl)
        };
        let pacer = Pacer::new(config.pacing);
        Self {
            http,
            cache,
            pacer,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch one page of summary market data for the configured universe.
    ///
    /// Returns the raw provider records; validation belongs to the transform
    /// step. Errors here are fatal to the Extract step and handled by its
    /// retry policy.
    pub async fn fetch_snapshot(&self) -> Result<Vec<Value>, FetchError> {
        let url = self.snapshot_url();
        let body = self.get_body(&url).await?;
        let records: Vec<Value> = serde_json::from_str(&body)?;
        info!(records = records.len(), "snapshot extraction complete");
        Ok(records)
    }

    /// Fetch OHLC candles for one asset over a lookback window in days.
    pub async fn fetch_ohlc(
        &self,
        asset: &AssetId,
        window_days: u32,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let url = self.ohlc_url(asset, window_days);
        let body = self.get_body(&url).await?;
        let candles: Vec<RawCandle> = serde_json::from_str(&body)?;
        Ok(candles)
    }

    /// Serially fetch OHLC candles for every asset in the universe.
    ///
    /// Calls are paced by the configured minimum interval. Per-asset
    /// failures are logged and counted but never raised:
    /// 429 cools down and moves on, 404 skips the (possibly delisted)
    /// asset, timeouts and other transient failures skip as well.
    pub async fn fetch_ohlc_universe(
        &self,
        assets: &[AssetId],
        window_days: u32,
    ) -> (Vec<RawBar>, ExtractReport) {
        let mut bars = Vec::new();
        let mut report = ExtractReport::new(assets.len());

        for (index, asset) in assets.iter().enumerate() {
            self.pacer.until_ready().await;

            match self.fetch_ohlc(asset, window_days).await {
                Ok(candles) => {
                    info!(
                        asset = %asset,
                        candles = candles.len(),
                        position = index + 1,
                        total = assets.len(),
                        "fetched ohlc candles"
                    );
                    report.fetched += 1;
                    bars.extend(
                        candles
                            .into_iter()
                            .map(|candle| RawBar::from_candle(asset.clone(), candle)),
                    );
                }
                Err(FetchError::RateLimited) => {
                    warn!(
                        asset = %asset,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "rate limited; cooling down and continuing with next asset"
                    );
                    report.rate_limited += 1;
                    tokio::time::sleep(self.config.cooldown).await;
                }
                Err(FetchError::NotFound) => {
                    warn!(asset = %asset, "asset not found (404), possibly delisted; skipping");
                    report.not_found += 1;
                }
                Err(error) => {
                    warn!(asset = %asset, %error, "transient fetch failure; skipping asset");
                    report.skipped += 1;
                }
            }
        }

        report.bars = bars.len();
        info!(
            requested = report.requested,
            fetched = report.fetched,
            bars = report.bars,
            "ohlc extraction complete"
        );
        (bars, report)
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        if let Some(body) = self.cache.get(url).await {
            return Ok(body);
        }

        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.config.http_timeout_ms);
        let response = self.http.execute(request).await?;

        match response.status {
            200..=299 => {
                self.cache.put(url.to_owned(), response.body.clone()).await;
                Ok(response.body)
            }
            429 => Err(FetchError::RateLimited),
            404 => Err(FetchError::NotFound),
            status => Err(FetchError::Status { status }),
        }
    }

    fn snapshot_url(&self) -> String {
        let mut url = format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&page={}&sparkline=false",
            self.config.base_url,
            urlencoding::encode(&self.config.vs_currency),
            self.config.per_page,
            self.config.page,
        );
        if !self.config.ids.is_empty() {
            let ids = self
                .config
                .ids
                .iter()
                .map(AssetId::as_str)
                .collect::<Vec<_>>()
                .join(",");
            url.push_str("&ids=");
            url.push_str(urlencoding::encode(&ids).as_ref());
        }
        if let Some(key) = &self.config.api_key {
            url.push_str("&x_cg_demo_api_key=");
            url.push_str(urlencoding::encode(key).as_ref());
        }
        url
    }

    fn ohlc_url(&self, asset: &AssetId, window_days: u32) -> String {
        let mut url = format!(
            "{}/coins/{}/ohlc?vs_currency={}&days={}",
            self.config.base_url,
            asset.as_str(),
            urlencoding::encode(&self.config.vs_currency),
            window_days,
        );
        if let Some(key) = &self.config.api_key {
            url.push_str("&x_cg_demo_api_key=");
            url.push_str(urlencoding::encode(key).as_ref());
        }
        url
    }
}

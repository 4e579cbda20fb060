//! Pipeline configuration assembled from the environment.
//!
//! Nothing in the pipeline reads the environment directly; everything is
//! gathered here once and passed into components at construction.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::client::ClientConfig;
use crate::domain::AssetId;
use crate::pipeline::FlowPolicies;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything a pipeline run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Database file override; `None` uses the warehouse default location.
    pub db_path: Option<PathBuf>,
    pub client: ClientConfig,
    /// Lookback window for per-asset OHLC extraction, in days.
    pub ohlc_days: u32,
    /// Rank threshold for universe discovery from the snapshot table.
    pub max_rank: u32,
    pub snapshot_policies: FlowPolicies,
    pub ohlc_policies: FlowPolicies,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            client: ClientConfig::default(),
            ohlc_days: 7,
            max_rank: 50,
            snapshot_policies: FlowPolicies::snapshot_defaults(),
            ohlc_policies: FlowPolicies::ohlc_defaults(),
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from `MARKETPIPE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();

        let client = ClientConfig {
            base_url: string_var("MARKETPIPE_BASE_URL", defaults.base_url),
            vs_currency: string_var("MARKETPIPE_VS_CURRENCY", defaults.vs_currency),
            per_page: parsed_var("MARKETPIPE_PER_PAGE", defaults.per_page)?,
            page: parsed_var("MARKETPIPE_PAGE", defaults.page)?,
            ids: ids_var("MARKETPIPE_IDS")?,
            api_key: optional_var("MARKETPIPE_API_KEY"),
            pacing: Duration::from_secs(parsed_var(
                "MARKETPIPE_PACING_SECS",
                defaults.pacing.as_secs(),
            )?),
            cooldown: Duration::from_secs(parsed_var(
                "MARKETPIPE_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )?),
            cache_ttl: Duration::from_secs(parsed_var(
                "MARKETPIPE_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            http_timeout_ms: parsed_var("MARKETPIPE_HTTP_TIMEOUT_MS", defaults.http_timeout_ms)?,
        };

        Ok(Self {
            db_path: optional_var("MARKETPIPE_DB_PATH").map(PathBuf::from),
            client,
            ohlc_days: parsed_var("MARKETPIPE_OHLC_DAYS", 7)?,
            max_rank: parsed_var("MARKETPIPE_MAX_RANK", 50)?,
            snapshot_policies: FlowPolicies::snapshot_defaults(),
            ohlc_policies: FlowPolicies::ohlc_defaults(),
        })
    }
}

fn optional_var(var: &'static str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}

fn string_var(var: &'static str, default: String) -> String {
    optional_var(var).unwrap_or(default)
}

fn parsed_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|error: T::Err| ConfigError::Invalid {
            var,
            value,
            reason: error.to_string(),
        }),
    }
}

fn ids_var(var: &'static str) -> Result<Vec<AssetId>, ConfigError> {
    let Some(raw) = optional_var(var) else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            AssetId::parse(entry).map_err(|error| ConfigError::Invalid {
                var,
                value: entry.to_owned(),
                reason: error.to_string(),
            })
        })
        .collect()
}

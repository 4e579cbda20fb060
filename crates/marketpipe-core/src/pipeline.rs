//! Pipeline orchestration.
//!
//! Two linear flows share the same step machine:
//!
//! ```text
//! snapshot: EnsureSchema -> Extract -> Transform -> Load
//! ohlc:     EnsureSchema -> Extract -> Transform -> Load -> Deduplicate -> RebuildViews
//! ```
//!
//! Each step runs under its own [`StepPolicy`]; a step that exhausts its
//! retries fails the whole run and later steps never execute. This is the
//! opposite of the per-asset policy inside Extract, where individual assets
//! are skipped and the batch survives.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use marketpipe_warehouse::{BarRecord, QuoteRecord, Warehouse, WarehouseError};

use crate::client::{ExtractReport, FetchError, MarketClient};
use crate::domain::{AssetId, AssetQuote, OhlcBar};
use crate::policy::{run_step, StepError, StepPolicy};
use crate::transform::{transform_ohlc, transform_snapshot, TransformError};
use crate::ValidationError;

/// Failure of a pipeline run.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("step '{step}' timed out after {timeout_ms}ms ({attempts} attempts)")]
    StepTimeout {
        step: &'static str,
        attempts: u32,
        timeout_ms: u64,
    },

    #[error("step '{step}' failed after {attempts} attempts: {source}")]
    StepFailed {
        step: &'static str,
        attempts: u32,
        #[source]
        source: Box<FlowError>,
    },
}

fn step_failure(step: &'static str, error: StepError<FlowError>) -> FlowError {
    match error {
        StepError::TimedOut { attempts, timeout } => FlowError::StepTimeout {
            step,
            attempts,
            timeout_ms: timeout.as_millis() as u64,
        },
        StepError::Exhausted { attempts, last } => FlowError::StepFailed {
            step,
            attempts,
            source: Box::new(last),
        },
    }
}

/// Per-step policies for one flow.
#[derive(Debug, Clone)]
pub struct FlowPolicies {
    pub ensure_schema: StepPolicy,
    pub extract: StepPolicy,
    pub transform: StepPolicy,
    pub load: StepPolicy,
    pub dedupe: StepPolicy,
    pub rebuild_views: StepPolicy,
}

impl FlowPolicies {
    /// Defaults for the snapshot flow: quick steps, quick retries.
    pub fn snapshot_defaults() -> Self {
        Self {
            ensure_schema: StepPolicy::fixed(3, Duration::from_secs(1), Duration::from_secs(60)),
            extract: StepPolicy::fixed(3, Duration::from_secs(1), Duration::from_secs(60)),
            transform: StepPolicy::no_retry(Duration::from_secs(30)),
            load: StepPolicy::fixed(3, Duration::from_secs(1), Duration::from_secs(60)),
            dedupe: StepPolicy::fixed(3, Duration::from_secs(1), Duration::from_secs(60)),
            rebuild_views: StepPolicy::fixed(3, Duration::from_secs(1), Duration::from_secs(60)),
        }
    }

    /// Defaults for the OHLC flow: the paced per-asset loop needs a long
    /// extract budget and patient retries.
    pub fn ohlc_defaults() -> Self {
        Self {
            extract: StepPolicy::fixed(3, Duration::from_secs(30), Duration::from_secs(1_800)),
            ..Self::snapshot_defaults()
        }
    }
}

/// One line of the run report: which step ran and how many rows/assets it
/// touched.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub count: usize,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub run_id: Uuid,
    pub flow: &'static str,
    pub steps: Vec<StepReport>,
    pub rows_loaded: usize,
    pub rows_rejected: usize,
}

impl FlowReport {
    fn new(run_id: Uuid, flow: &'static str) -> Self {
        Self {
            run_id,
            flow,
            steps: Vec::new(),
            rows_loaded: 0,
            rows_rejected: 0,
        }
    }

    fn push(&mut self, step: &'static str, count: usize) {
        self.steps.push(StepReport { step, count });
    }
}

/// Result of a snapshot run: the loaded rows plus the report.
#[derive(Debug, Clone)]
pub struct SnapshotRun {
    pub rows: Vec<AssetQuote>,
    pub report: FlowReport,
}

/// Result of an OHLC run.
#[derive(Debug, Clone)]
pub struct OhlcRun {
    pub rows: Vec<OhlcBar>,
    pub report: FlowReport,
    pub extract: ExtractReport,
}

/// The snapshot pipeline: one markets page into `asset_quotes`.
pub struct SnapshotFlow {
    client: MarketClient,
    warehouse: Warehouse,
    policies: FlowPolicies,
}

impl SnapshotFlow {
    pub fn new(client: MarketClient, warehouse: Warehouse, policies: FlowPolicies) -> Self {
        Self {
            client,
            warehouse,
            policies,
        }
    }

    pub async fn run(&self) -> Result<SnapshotRun, FlowError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, flow = "snapshot", "starting pipeline run");
        let mut report = FlowReport::new(run_id, "snapshot");

        let warehouse = &self.warehouse;
        let client = &self.client;

        run_step("ensure_schema", &self.policies.ensure_schema, || async move {
            warehouse.ensure_schema().map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("ensure_schema", error))?;
        info!(%run_id, step = "ensure_schema", "schema verified");
        report.push("ensure_schema", 0);

        let raw = run_step("extract", &self.policies.extract, || async move {
            client.fetch_snapshot().await.map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("extract", error))?;
        info!(%run_id, step = "extract", records = raw.len(), "extraction succeeded");
        report.push("extract", raw.len());

        let raw_ref = &raw;
        let batch = run_step("transform", &self.policies.transform, || async move {
            transform_snapshot(raw_ref).map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("transform", error))?;
        info!(
            %run_id,
            step = "transform",
            valid = batch.rows.len(),
            rejected = batch.rejected.len(),
            "transform succeeded"
        );
        report.push("transform", batch.rows.len());
        report.rows_rejected = batch.rejected.len();

        let records: Vec<QuoteRecord> = batch.rows.iter().map(quote_record).collect();
        let records_ref = &records;
        let loaded = run_step("load", &self.policies.load, || async move {
            warehouse.append_quotes(records_ref).map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("load", error))?;
        info!(%run_id, step = "load", rows = loaded, "load succeeded");
        report.push("load", loaded);
        report.rows_loaded = loaded;

        info!(%run_id, flow = "snapshot", rows = loaded, "pipeline run complete");
        Ok(SnapshotRun {
            rows: batch.rows,
            report,
        })
    }
}

/// The OHLC pipeline: paced per-asset candle extraction into `ohlc_bars`,
/// followed by deduplication and per-asset view rebuilds.
pub struct OhlcFlow {
    client: MarketClient,
    warehouse: Warehouse,
    policies: FlowPolicies,
    window_days: u32,
    max_rank: u32,
}

impl OhlcFlow {
    pub fn new(
        client: MarketClient,
        warehouse: Warehouse,
        policies: FlowPolicies,
        window_days: u32,
        max_rank: u32,
    ) -> Self {
        Self {
            client,
            warehouse,
            policies,
            window_days,
            max_rank,
        }
    }

    /// Universe for this run: the configured fixed list, or discovery from
    /// the snapshot table below the rank threshold.
    fn resolve_universe(&self) -> Result<Vec<AssetId>, FlowError> {
        if !self.client.config().ids.is_empty() {
            return Ok(self.client.config().ids.clone());
        }

        let discovered = self.warehouse.tracked_assets(self.max_rank)?;
        let universe = discovered
            .iter()
            .map(|id| AssetId::parse(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(universe)
    }

    pub async fn run(&self) -> Result<OhlcRun, FlowError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, flow = "ohlc", "starting pipeline run");
        let mut report = FlowReport::new(run_id, "ohlc");

        let this = self;
        let warehouse = &self.warehouse;

        run_step("ensure_schema", &self.policies.ensure_schema, || async move {
            warehouse.ensure_schema().map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("ensure_schema", error))?;
        info!(%run_id, step = "ensure_schema", "schema verified");
        report.push("ensure_schema", 0);

        let (universe, raw, extract_report) =
            run_step("extract", &self.policies.extract, || async move {
                let universe = this.resolve_universe()?;
                info!(%run_id, assets = universe.len(), "resolved extraction universe");
                let (raw, extract_report) = this
                    .client
                    .fetch_ohlc_universe(&universe, this.window_days)
                    .await;
                Ok::<_, FlowError>((universe, raw, extract_report))
            })
            .await
            .map_err(|error| step_failure("extract", error))?;
        info!(
            %run_id,
            step = "extract",
            assets = extract_report.fetched,
            bars = raw.len(),
            "extraction succeeded"
        );
        report.push("extract", raw.len());

        let raw_ref = &raw;
        let batch = run_step("transform", &self.policies.transform, || async move {
            transform_ohlc(raw_ref).map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("transform", error))?;
        info!(
            %run_id,
            step = "transform",
            valid = batch.rows.len(),
            rejected = batch.rejected.len(),
            "transform succeeded"
        );
        report.push("transform", batch.rows.len());
        report.rows_rejected = batch.rejected.len();

        let records: Vec<BarRecord> = batch.rows.iter().map(bar_record).collect();
        let records_ref = &records;
        let loaded = run_step("load", &self.policies.load, || async move {
            warehouse.append_bars(records_ref).map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("load", error))?;
        info!(%run_id, step = "load", rows = loaded, "load succeeded");
        report.push("load", loaded);
        report.rows_loaded = loaded;

        let removed = run_step("dedupe", &self.policies.dedupe, || async move {
            warehouse.dedupe_bars().map_err(FlowError::from)
        })
        .await
        .map_err(|error| step_failure("dedupe", error))?;
        info!(%run_id, step = "dedupe", removed, "deduplication succeeded");
        report.push("dedupe", removed);

        let universe_ref = &universe;
        let rebuilt = run_step("rebuild_views", &self.policies.rebuild_views, || async move {
            let mut rebuilt = 0;
            for asset in universe_ref {
                warehouse.rebuild_asset_view(asset.as_str())?;
                rebuilt += 1;
            }
            Ok::<usize, FlowError>(rebuilt)
        })
        .await
        .map_err(|error| step_failure("rebuild_views", error))?;
        info!(%run_id, step = "rebuild_views", views = rebuilt, "view rebuild succeeded");
        report.push("rebuild_views", rebuilt);

        info!(%run_id, flow = "ohlc", rows = report.rows_loaded, "pipeline run complete");
        Ok(OhlcRun {
            rows: batch.rows,
            report,
            extract: extract_report,
        })
    }
}

fn quote_record(quote: &AssetQuote) -> QuoteRecord {
    QuoteRecord {
        asset_id: quote.asset_id.as_str().to_owned(),
        symbol: quote.symbol.clone(),
        name: quote.name.clone(),
        image: quote.image.clone(),
        current_price: quote.current_price,
        market_cap: quote.market_cap,
        market_cap_rank: quote.market_cap_rank.map(i64::from),
        collected_at: quote.collected_at.format_rfc3339(),
    }
}

fn bar_record(bar: &OhlcBar) -> BarRecord {
    BarRecord {
        asset_id: bar.asset_id.as_str().to_owned(),
        bucket_ts: bar.bucket_ts.format_rfc3339(),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
    }
}

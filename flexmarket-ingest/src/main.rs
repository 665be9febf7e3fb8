use anyhow::Result;
use flexmarket_client::{DispatchRow, PtuRow};
use flexmarket_ingest::{
    config::{AppConfig, GopacsConfig, UkpnConfig},
    metrics_export, observability,
    pipeline::Pipeline,
    sinks::CsvTableSink,
    sources::{GopacsClient, GopacsEvent, PaginatedSource, UkpnClient, UkpnDispatch},
    transform::{ClearingEventFlattening, DispatchFlattening},
    RunSummary,
};
use std::{path::Path, sync::Arc, time::Duration};

async fn fetch_ukpn(cfg: &UkpnConfig) -> Result<RunSummary> {
    let windows = cfg.windows()?;
    let api_key = cfg.api_key();
    if api_key.is_none() {
        tracing::warn!(env = %cfg.api_key_env, "no UKPN api key set, requests are unauthenticated");
    }

    let client = UkpnClient::new(&cfg.base_url, &cfg.dataset_id, api_key)?;
    let source = PaginatedSource::new(client, cfg.page_size)
        .with_request_delay(Duration::from_millis(cfg.request_delay_ms))
        .with_max_offset(cfg.max_offset)
        .with_windows(windows);

    let pipeline: Pipeline<_, UkpnDispatch, DispatchRow, _> = Pipeline {
        source,
        transform: Arc::new(DispatchFlattening),
        sink: CsvTableSink::<DispatchRow>::new(&cfg.output_path),
    };
    Ok(pipeline.run().await?)
}

async fn fetch_gopacs(cfg: &GopacsConfig) -> Result<RunSummary> {
    let client = GopacsClient::new(&cfg.base_url)?;
    let source = PaginatedSource::new(client, cfg.page_size)
        .with_request_delay(Duration::from_millis(cfg.request_delay_ms));

    let pipeline: Pipeline<_, GopacsEvent, PtuRow, _> = Pipeline {
        source,
        transform: Arc::new(ClearingEventFlattening),
        sink: CsvTableSink::<PtuRow>::new(&cfg.output_path),
    };
    Ok(pipeline.run().await?)
}

/// One source after the other; never two requests in flight.
async fn fetch_all(cfg: &AppConfig) -> Result<()> {
    if let Some(ukpn) = &cfg.ukpn {
        tracing::info!(output = %ukpn.output_path, "fetching UKPN dispatches");
        let summary = fetch_ukpn(ukpn).await?;
        tracing::info!(
            parents = summary.parents,
            rejected = summary.rejected,
            rows = summary.rows,
            "UKPN fetch finished"
        );
    }

    if let Some(gopacs) = &cfg.gopacs {
        tracing::info!(output = %gopacs.output_path, "fetching GOPACS cleared buckets");
        let summary = fetch_gopacs(gopacs).await?;
        tracing::info!(
            parents = summary.parents,
            rejected = summary.rejected,
            rows = summary.rows,
            "GOPACS fetch finished"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if cfg.metrics.is_some() {
        metrics_export::init()?;
    }

    if cfg.ukpn.is_none() && cfg.gopacs.is_none() {
        tracing::warn!("no [ukpn] or [gopacs] section configured, nothing to fetch");
    }

    let outcome = fetch_all(&cfg).await;
    let textfile = cfg.metrics.as_ref().map(|m| Path::new(&m.textfile_path));
    metrics_export::finish(outcome, textfile)
}

use anyhow::{bail, Result};
use flexmarket_client::{load_table, DispatchRow, PtuRow};
use flexmarket_ingest::{
    charts::{self, ChartRenderer},
    config::{AppConfig, ChartsConfig, SourceKind},
    observability,
};
use std::{env, path::Path};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: render_charts <ukpn|gopacs> <table.csv> [output_dir]");
    }
    let kind: SourceKind = args[1].parse()?;
    let path = Path::new(&args[2]);

    // Chart settings come from the config file when there is one.
    let charts_cfg = match AppConfig::load() {
        Ok(cfg) => cfg.charts,
        Err(e) => {
            tracing::debug!(error = %e, "no usable config, using chart defaults");
            ChartsConfig::default()
        }
    };
    let output_dir = args.get(3).cloned().unwrap_or(charts_cfg.output_dir);
    let renderer = ChartRenderer::new(&output_dir, charts_cfg.width, charts_cfg.height);

    let specs = match kind {
        SourceKind::Ukpn => {
            let rows: Vec<DispatchRow> = load_table(path)?;
            charts::dispatch_charts(&rows)
        }
        SourceKind::Gopacs => {
            let rows: Vec<PtuRow> = load_table(path)?;
            charts::clearing_charts(&rows)
        }
    };

    let summary = renderer.render_all(&specs);
    tracing::info!(
        source = %kind,
        dir = %output_dir,
        rendered = summary.rendered.len(),
        failed = summary.failed,
        "charts finished"
    );

    Ok(())
}

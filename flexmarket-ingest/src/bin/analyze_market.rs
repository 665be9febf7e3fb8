use anyhow::{bail, Result};
use flexmarket_client::{load_table, DispatchRow, PtuRow};
use flexmarket_ingest::{config::SourceKind, observability, report};
use std::{env, path::Path};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: analyze_market <ukpn|gopacs> <table.csv>");
    }
    let kind: SourceKind = args[1].parse()?;
    let path = Path::new(&args[2]);

    let text = match kind {
        SourceKind::Ukpn => {
            let rows: Vec<DispatchRow> = load_table(path)?;
            tracing::info!(rows = rows.len(), path = %path.display(), "table loaded");
            report::dispatch_report(&rows)
        }
        SourceKind::Gopacs => {
            let rows: Vec<PtuRow> = load_table(path)?;
            tracing::info!(rows = rows.len(), path = %path.display(), "table loaded");
            report::clearing_report(&rows)
        }
    };
    println!("{text}");

    Ok(())
}

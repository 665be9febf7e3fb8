use std::{collections::HashSet, marker::PhantomData, path::PathBuf};

use flexmarket_client::{write_table, Observation, TableRow};
use futures::{Stream, StreamExt};

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Collects the whole run and writes it as a single CSV table.
///
/// Nothing reaches disk unless the input stream completes without error.
/// Rows are deduplicated on their natural key (first arrival wins) and
/// written newest first.
pub struct CsvTableSink<R> {
    path: PathBuf,
    _row: PhantomData<fn() -> R>,
}

impl<R> CsvTableSink<R> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            _row: PhantomData,
        }
    }
}

/// Drop repeated natural keys, keeping the first occurrence, then order by
/// start time descending. The sort is stable, so equal starts keep arrival
/// order.
pub fn prepare_rows<R: TableRow + Observation>(rows: Vec<R>) -> (Vec<R>, usize) {
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    let mut unique: Vec<R> = rows
        .into_iter()
        .filter(|row| seen.insert(row.natural_key()))
        .collect();
    let dropped = before - unique.len();

    unique.sort_by(|a, b| b.start().cmp(&a.start()));
    (unique, dropped)
}

#[async_trait::async_trait]
impl<R> Sink<R> for CsvTableSink<R>
where
    R: TableRow + Observation + Send + 'static,
{
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<R>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut rows = Vec::new();
        while let Some(item) = input.next().await {
            rows.push(item?.payload);
        }

        let (rows, dropped) = prepare_rows(rows);
        if dropped > 0 {
            metrics::counter!("duplicate_rows_dropped_total").increment(dropped as u64);
            tracing::warn!(dropped, "duplicate rows dropped on natural key");
        }

        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || write_table(&path, &rows))
            .await
            .map_err(|e| PipelineError::Sink(format!("table writer task failed: {e}")))?
            .map_err(|e| PipelineError::Sink(e.to_string()))?;

        metrics::counter!("rows_written_total").increment(written as u64);
        tracing::info!(rows = written, path = %self.path.display(), "table written");
        Ok(())
    }
}

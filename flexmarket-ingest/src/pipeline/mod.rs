use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

use crate::sources::FetchError;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn now(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] FetchError),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

/// Pure one-to-many mapping from a parent record to its output rows.
pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: Envelope<I>) -> Result<Vec<Envelope<O>>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

/// Counts reported by one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub parents: usize,
    pub rejected: usize,
    pub rows: usize,
}

pub struct Pipeline<S, I, O, K> {
    pub source: S,
    pub transform: Arc<dyn Transform<I, O>>,
    pub sink: K,
}

impl<S, I, O, K> Pipeline<S, I, O, K>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Source<I> + Send + Sync + 'static,
    K: Sink<O> + Send + Sync + 'static,
{
    /// Drain the source completely, flatten every parent record, then hand
    /// the full row set to the sink.
    ///
    /// A source error aborts the run before the sink sees anything. A record
    /// rejected by the transform is logged and skipped.
    pub async fn run(self) -> Result<RunSummary, PipelineError> {
        let mut stream = self.source.stream().await;

        let mut parents = Vec::new();
        while let Some(item) = stream.next().await {
            parents.push(item?);
        }
        tracing::info!(parents = parents.len(), "source exhausted, flattening");

        let mut summary = RunSummary {
            parents: parents.len(),
            ..RunSummary::default()
        };
        let mut rows = Vec::new();
        for env in parents {
            match self.transform.apply(env) {
                Ok(flat) => rows.extend(flat),
                Err(e) => {
                    summary.rejected += 1;
                    metrics::counter!("records_rejected_total").increment(1);
                    tracing::warn!(error = %e, "record rejected at flattening boundary");
                }
            }
        }
        summary.rows = rows.len();

        self.sink
            .run(futures::stream::iter(rows.into_iter().map(Ok)))
            .await?;

        Ok(summary)
    }
}

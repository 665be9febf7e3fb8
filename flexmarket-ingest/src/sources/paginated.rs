use std::{pin::Pin, sync::Arc, time::Duration};

use futures::Stream;

use super::{DateWindow, PageFetcher, PageRequest};
use crate::pipeline::{Envelope, PipelineError, Source};

/// Drives a [`PageFetcher`] through every page of every date window, one
/// request at a time.
///
/// A window's page loop ends on the first of: an empty page, a short page,
/// the reported record or page total being reached, or the next request
/// crossing `max_offset`. Windows are fetched in order; a window with no
/// records is simply exhausted. The delay is slept before every request
/// except the first of the run.
pub struct PaginatedSource<F: PageFetcher> {
    fetcher: Arc<F>,
    page_size: usize,
    request_delay: Duration,
    max_offset: Option<usize>,
    windows: Vec<Option<DateWindow>>,
}

impl<F: PageFetcher> PaginatedSource<F> {
    pub fn new(fetcher: F, page_size: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            page_size: page_size.max(1),
            request_delay: Duration::ZERO,
            max_offset: None,
            windows: vec![None],
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Upper bound on `offset + limit` imposed by the API.
    pub fn with_max_offset(mut self, max_offset: usize) -> Self {
        self.max_offset = Some(max_offset);
        self
    }

    /// Fetch each window in turn instead of one unbounded query. An empty
    /// list keeps the single unbounded window.
    pub fn with_windows(mut self, windows: Vec<DateWindow>) -> Self {
        if !windows.is_empty() {
            self.windows = windows.into_iter().map(Some).collect();
        }
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[async_trait::async_trait]
impl<F> Source<F::Record> for PaginatedSource<F>
where
    F: PageFetcher + 'static,
{
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<F::Record>, PipelineError>> + Send>> {
        let fetcher = Arc::clone(&self.fetcher);
        let page_size = self.page_size;
        let delay = self.request_delay;
        let max_offset = self.max_offset;
        let windows = self.windows.clone();

        let s = async_stream::try_stream! {
            let source = fetcher.name();
            let mut first_request = true;

            for window in windows {
                let label = window.map(|w| w.to_string()).unwrap_or_else(|| "all".to_string());
                let mut page_index = 0usize;
                let mut offset = 0usize;
                let mut accumulated = 0usize;

                loop {
                    if let Some(max) = max_offset {
                        if offset + page_size > max {
                            tracing::warn!(
                                source,
                                window = %label,
                                records = accumulated,
                                max_offset = max,
                                "offset ceiling reached, window truncated; narrow the date windows"
                            );
                            break;
                        }
                    }

                    if !first_request && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    first_request = false;

                    let request = PageRequest {
                        page_index,
                        offset,
                        limit: page_size,
                        window,
                    };
                    let page = fetcher
                        .fetch_page(&request)
                        .await
                        .map_err(PipelineError::Source)?;

                    let received = page.records.len();
                    metrics::counter!("pages_fetched_total", "source" => source).increment(1);
                    metrics::counter!("records_fetched_total", "source" => source)
                        .increment(received as u64);
                    tracing::debug!(source, window = %label, page = page_index, offset, received, "page fetched");

                    accumulated += received;
                    page_index += 1;
                    offset += received;

                    for record in page.records {
                        yield Envelope::now(record);
                    }

                    let reached_total = page.total_records.is_some_and(|total| accumulated >= total);
                    let reached_last_page = page.total_pages.is_some_and(|pages| page_index >= pages);
                    if received < page_size || reached_total || reached_last_page {
                        break;
                    }
                }

                tracing::info!(source, window = %label, records = accumulated, pages = page_index, "window exhausted");
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use futures::StreamExt;
    use time::macros::date;

    use super::*;
    use crate::sources::{FetchError, Page};

    /// Serves scripted pages in order and records every request it sees.
    struct ScriptedFetcher {
        pages: Mutex<VecDeque<Result<Page<u32>, FetchError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<Result<Page<u32>, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn sized(sizes: &[usize]) -> Self {
            Self::new(sizes.iter().map(|&n| Ok(Page::new(vec![7; n]))).collect())
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for ScriptedFetcher {
        type Record = u32;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_page(&self, request: &PageRequest) -> Result<Page<u32>, FetchError> {
            self.requests.lock().unwrap().push(request.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Page::new(Vec::new())))
        }
    }

    async fn drain<F: PageFetcher + 'static>(
        source: &PaginatedSource<F>,
    ) -> Result<Vec<F::Record>, PipelineError> {
        let mut stream = source.stream().await;
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item?.payload);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn short_page_ends_the_loop() {
        let source = PaginatedSource::new(ScriptedFetcher::sized(&[100, 100, 100, 37, 0]), 100);
        let records = drain(&source).await.unwrap();

        assert_eq!(records.len(), 337);
        let requests = source.fetcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        let offsets: Vec<usize> = requests.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 100, 200, 300]);
        let indices: Vec<usize> = requests.iter().map(|r| r.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn reported_total_ends_the_loop_on_a_full_page() {
        let pages = vec![
            Ok(Page { records: vec![1, 2], total_records: Some(4), total_pages: None }),
            Ok(Page { records: vec![3, 4], total_records: Some(4), total_pages: None }),
        ];
        let source = PaginatedSource::new(ScriptedFetcher::new(pages), 2);
        assert_eq!(drain(&source).await.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(source.fetcher.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reported_page_count_ends_the_loop() {
        let pages = vec![Ok(Page { records: vec![1, 2], total_records: None, total_pages: Some(1) })];
        let source = PaginatedSource::new(ScriptedFetcher::new(pages), 2);
        assert_eq!(drain(&source).await.unwrap(), vec![1, 2]);
        assert_eq!(source.fetcher.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_window_is_exhausted_and_the_next_one_is_fetched() {
        let windows = DateWindow::split(date!(2024-01-01), date!(2024-03-01), 1);
        let source = PaginatedSource::new(ScriptedFetcher::sized(&[0, 3]), 10).with_windows(windows.clone());

        assert_eq!(drain(&source).await.unwrap().len(), 3);
        let requests = source.fetcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].window, Some(windows[0]));
        assert_eq!(requests[1].window, Some(windows[1]));
        assert_eq!(requests[1].offset, 0);
    }

    #[tokio::test]
    async fn offset_ceiling_truncates_the_window() {
        let source = PaginatedSource::new(ScriptedFetcher::sized(&[10, 10, 10, 10]), 10).with_max_offset(25);
        assert_eq!(drain(&source).await.unwrap().len(), 20);
        assert_eq!(source.fetcher.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fetch_error_ends_the_stream_with_an_error() {
        let pages = vec![
            Ok(Page::new(vec![1, 2])),
            Err(FetchError::Transport("connection reset".into())),
        ];
        let source = PaginatedSource::new(ScriptedFetcher::new(pages), 2);
        let err = drain(&source).await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(FetchError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_slept_between_requests_only() {
        let source = PaginatedSource::new(ScriptedFetcher::sized(&[5, 5, 1]), 5)
            .with_request_delay(Duration::from_millis(500));

        let started = tokio::time::Instant::now();
        drain(&source).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }
}

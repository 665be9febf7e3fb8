use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::{get_json, FetchError, FieldValue, Page, PageFetcher, PageRequest};

/// A GOPACS cleared bucket (clearing event) with its PTUs in order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GopacsEvent {
    #[serde(rename = "clearingEventId")]
    pub clearing_event_id: Option<FieldValue>,
    #[serde(rename = "organisationName")]
    pub organisation_name: Option<FieldValue>,
    #[serde(rename = "buyVolumeInMWh")]
    pub buy_volume_mwh: Option<FieldValue>,
    #[serde(rename = "sellVolumeInMWh")]
    pub sell_volume_mwh: Option<FieldValue>,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    #[serde(rename = "clearedVolumesForPtus")]
    pub ptus: Option<Vec<PtuVolume>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PtuVolume {
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    #[serde(rename = "buyVolumeInMW")]
    pub buy_volume_mw: Option<FieldValue>,
    #[serde(rename = "sellVolumeInMW")]
    pub sell_volume_mw: Option<FieldValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearedBucketsPage {
    #[serde(default)]
    content: Vec<GopacsEvent>,
    total_pages: Option<usize>,
    total_elements: Option<usize>,
}

/// Page fetcher for the GOPACS cleared-buckets report (zero-based page
/// index, no credential).
///
/// The endpoint has no date filter, so `PageRequest::window` is not sent.
#[derive(Clone)]
pub struct GopacsClient {
    client: Client,
    url: String,
}

impl GopacsClient {
    pub fn new(url: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for GopacsClient {
    type Record = GopacsEvent;

    fn name(&self) -> &'static str {
        "gopacs"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<GopacsEvent>, FetchError> {
        let query = [
            ("page", request.page_index.to_string()),
            ("size", request.limit.to_string()),
        ];

        let body: ClearedBucketsPage = get_json(self.client.get(&self.url).query(&query)).await?;

        Ok(Page {
            records: body.content,
            total_records: body.total_elements,
            total_pages: body.total_pages,
        })
    }
}

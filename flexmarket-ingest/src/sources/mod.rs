pub mod gopacs;
pub mod paginated;
pub mod ukpn;
pub mod window;

pub use gopacs::{GopacsClient, GopacsEvent, PtuVolume};
pub use paginated::PaginatedSource;
pub use ukpn::{UkpnClient, UkpnDispatch};
pub use window::DateWindow;

use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Network failure or a non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// The body could not be parsed as the expected page structure.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// One page request. Sources use whichever cursor they paginate by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: usize,
    pub offset: usize,
    pub limit: usize,
    pub window: Option<DateWindow>,
}

#[derive(Debug, Clone)]
pub struct Page<R> {
    pub records: Vec<R>,
    /// Total records matching the query, when the source reports it.
    pub total_records: Option<usize>,
    pub total_pages: Option<usize>,
}

impl<R> Page<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            total_records: None,
            total_pages: None,
        }
    }
}

/// Issues exactly one request per call; pacing and termination belong to
/// [`PaginatedSource`].
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    type Record: Send + 'static;

    fn name(&self) -> &'static str;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Self::Record>, FetchError>;
}

/// A JSON scalar whose type the upstream APIs do not keep consistent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Numeric value; numeric strings are parsed, anything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Bool(_) => None,
        };
        value.filter(|v| v.is_finite())
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    let url = response.url().clone();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Transport(format!(
            "{url} returned {status}: {}",
            body.chars().take(200).collect::<String>()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::Transport(format!("reading body from {url}: {e}")))?;
    serde_json::from_str(&body).map_err(|e| FetchError::Decode(format!("{url}: {e}")))
}

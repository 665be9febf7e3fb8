use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;

use super::{get_json, FetchError, FieldValue, Page, PageFetcher, PageRequest};

/// A dispatch record as returned by the UKPN open data API.
///
/// Every field is optional here; presence is checked once, when the record
/// is flattened.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UkpnDispatch {
    pub fu_id: Option<FieldValue>,
    pub zone: Option<FieldValue>,
    pub company_name: Option<FieldValue>,
    pub technology: Option<FieldValue>,
    pub product: Option<FieldValue>,
    pub dispatch_type: Option<FieldValue>,
    pub start_time_local: Option<String>,
    pub end_time_local: Option<String>,
    pub utilisation_mw_req: Option<FieldValue>,
    pub utilisation_mwh_req: Option<FieldValue>,
    pub utilisation_price: Option<FieldValue>,
    pub availability_mwh_req: Option<FieldValue>,
    pub availability_price: Option<FieldValue>,
    pub hours_requested: Option<FieldValue>,
}

#[derive(Deserialize)]
struct RecordsResponse {
    total_count: Option<usize>,
    #[serde(default)]
    records: Vec<RecordEnvelope>,
}

#[derive(Deserialize)]
struct RecordEnvelope {
    record: RecordBody,
}

#[derive(Deserialize)]
struct RecordBody {
    fields: UkpnDispatch,
}

/// Page fetcher for the UKPN flexibility dispatch dataset (offset/limit
/// pagination, optional `where` date filter).
#[derive(Clone)]
pub struct UkpnClient {
    client: Client,
    records_url: String,
}

impl UkpnClient {
    pub fn new(base_url: &str, dataset_id: &str, api_key: Option<String>) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = header::HeaderValue::from_str(&format!("Apikey {key}"))
                .map_err(|e| FetchError::Config(format!("invalid api key: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            records_url: format!(
                "{}/{}/records",
                base_url.trim_end_matches('/'),
                dataset_id
            ),
        })
    }
}

fn where_clause(request: &PageRequest) -> Option<String> {
    request.window.map(|w| {
        format!(
            r#"start_time_local >= "{}" AND start_time_local < "{}""#,
            w.start, w.end
        )
    })
}

#[async_trait::async_trait]
impl PageFetcher for UkpnClient {
    type Record = UkpnDispatch;

    fn name(&self) -> &'static str {
        "ukpn"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<UkpnDispatch>, FetchError> {
        let mut query = vec![
            ("limit", request.limit.to_string()),
            ("offset", request.offset.to_string()),
        ];
        if let Some(clause) = where_clause(request) {
            query.push(("where", clause));
        }

        let body: RecordsResponse = get_json(self.client.get(&self.records_url).query(&query)).await?;

        Ok(Page {
            records: body.records.into_iter().map(|r| r.record.fields).collect(),
            total_records: body.total_count,
            total_pages: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::DateWindow;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use time::macros::date;

    fn request(offset: usize) -> PageRequest {
        PageRequest {
            page_index: offset / 100,
            offset,
            limit: 100,
            window: None,
        }
    }

    #[tokio::test]
    async fn fetches_a_page_with_api_key_and_window() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ukpn-flexibility-dispatches/records")
            .match_header("authorization", "Apikey secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("offset".into(), "200".into()),
                Matcher::UrlEncoded(
                    "where".into(),
                    r#"start_time_local >= "2024-01-01" AND start_time_local < "2024-07-01""#.into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "total_count": 201,
                    "records": [{
                        "record": {
                            "id": "abc",
                            "fields": {
                                "fu_id": "FU-9",
                                "zone": "Hoddesdon",
                                "company_name": "Flexitricity",
                                "technology": "Battery",
                                "product": "Sustain",
                                "dispatch_type": "Utilisation",
                                "start_time_local": "2024-02-01T17:00:00+00:00",
                                "end_time_local": "2024-02-01T18:00:00+00:00",
                                "utilisation_mw_req": 1.2,
                                "utilisation_mwh_req": "1.2",
                                "utilisation_price": null
                            }
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = UkpnClient::new(
            &format!("{}/", server.url()),
            "ukpn-flexibility-dispatches",
            Some("secret".to_string()),
        )
        .unwrap();
        let mut req = request(200);
        req.window = Some(DateWindow {
            start: date!(2024-01-01),
            end: date!(2024-07-01),
        });

        let page = client.fetch_page(&req).await.unwrap();
        assert_eq!(page.total_records, Some(201));
        assert_eq!(page.records.len(), 1);
        let rec = &page.records[0];
        assert_eq!(rec.zone, Some(FieldValue::Text("Hoddesdon".into())));
        assert_eq!(rec.utilisation_mwh_req.as_ref().and_then(FieldValue::as_f64), Some(1.2));
        assert_eq!(rec.utilisation_price, None);
        assert_eq!(rec.availability_price, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_a_transport_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ds/records")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = UkpnClient::new(&server.url(), "ds", None).unwrap();
        let err = client.fetch_page(&request(0)).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(msg) if msg.contains("429")));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ds/records")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"records": [{"record": "oops"}]}"#)
            .create_async()
            .await;

        let client = UkpnClient::new(&server.url(), "ds", None).unwrap();
        let err = client.fetch_page(&request(0)).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_records_array_is_an_empty_page() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ds/records")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"total_count": 0}"#)
            .create_async()
            .await;

        let client = UkpnClient::new(&server.url(), "ds", None).unwrap();
        let page = client.fetch_page(&request(0)).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total_records, Some(0));
    }
}

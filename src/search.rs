use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::data_models::SearchResult;
use crate::logging::ConversationLog;

/// Google Custom Search accepts `num` in this range only.
pub const MAX_RESULTS_PER_REQUEST: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search API returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("search request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("search request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("search response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SearchError {
    /// Failures that come with talking to a remote service, as opposed to a broken contract.
    pub fn is_expected(&self) -> bool {
        !matches!(self, SearchError::Decode(_))
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout(err)
        } else {
            SearchError::Network(err)
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError>;
}

#[derive(Debug, Deserialize, Default)]
struct SearchPayload {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl From<SearchItem> for SearchResult {
    fn from(item: SearchItem) -> Self {
        SearchResult {
            title: item.title.unwrap_or_default(),
            snippet: item.snippet.unwrap_or_default(),
            url: item.link.unwrap_or_default(),
        }
    }
}

/// Maps a Custom Search JSON body to results. Missing fields become empty strings.
pub fn parse_results(body: &[u8]) -> Result<Vec<SearchResult>, SearchError> {
    let payload: SearchPayload = serde_json::from_slice(body)?;
    Ok(payload.items.into_iter().map(SearchResult::from).collect())
}

/// Client for the Google Custom Search JSON API.
pub struct GoogleSearchClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    log: ConversationLog,
}

impl GoogleSearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        timeout: Duration,
        log: ConversationLog,
    ) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SearchError::Network)?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            log,
        })
    }

    pub fn from_config(config: &Config, log: ConversationLog) -> Result<Self, SearchError> {
        Self::new(
            config.google_search_url.clone(),
            config.google_api_key.clone(),
            config.google_cse_id.clone(),
            config.search_timeout,
            log,
        )
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let num = limit.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(SearchError::from_transport)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SearchError::Api { status, body });
        }

        let body = res.bytes().await.map_err(SearchError::from_transport)?;
        let results = parse_results(&body)?;

        self.log.search_completed(
            query,
            results.len(),
            start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_tolerates_missing_fields() {
        let body = r#"{
            "items": [
                {"title": "Овуляция", "snippet": "Выход яйцеклетки.", "link": "https://a.example"},
                {"title": "Без ссылки"},
                {"snippet": null, "link": "https://c.example"}
            ]
        }"#;
        let results = parse_results(body.as_bytes()).unwrap();
        assert_eq!(
            results,
            vec![
                SearchResult::new("Овуляция", "Выход яйцеклетки.", "https://a.example"),
                SearchResult::new("Без ссылки", "", ""),
                SearchResult::new("", "", "https://c.example"),
            ]
        );
    }

    #[test]
    fn test_parse_results_without_items() {
        let body = br#"{"kind": "customsearch#search", "searchInformation": {"totalResults": "0"}}"#;
        assert!(parse_results(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_results_rejects_non_json() {
        let err = parse_results(b"<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, SearchError::Decode(_)));
        assert!(!err.is_expected());
    }

    #[test]
    fn test_api_error_is_expected() {
        let err = SearchError::Api {
            status: StatusCode::FORBIDDEN,
            body: "quota".into(),
        };
        assert!(err.is_expected());
        assert_eq!(err.to_string(), "search API returned 403 Forbidden: quota");
    }
}

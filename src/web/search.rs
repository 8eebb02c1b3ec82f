//! Web search via the Google Custom Search JSON API.
//!
//! Contract quirk, preserved deliberately: failures are signalled by
//! returning a single-element list whose text contains `"Error"` or
//! `"Missing"` instead of a distinct error type. The orchestrator detects
//! that sentinel and records the web source as failed without launching the
//! web fetcher. An empty list means the search ran but found nothing.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::FetchError;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

// ── Provider enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SearchProvider {
    GoogleCse(GoogleCseSearch),
    /// Fixed result list for tests.
    Static(StaticSearch),
}

impl SearchProvider {
    pub fn from_config(config: &SearchConfig) -> Self {
        SearchProvider::GoogleCse(GoogleCseSearch::new(config))
    }

    pub fn fixed(results: Vec<String>) -> Self {
        SearchProvider::Static(StaticSearch { results })
    }

    /// Top result URLs for `query`, in provider rank order — or the sentinel
    /// error list described in the module docs.
    pub async fn search(&self, query: &str) -> Vec<String> {
        match self {
            SearchProvider::GoogleCse(p) => p.search(query).await,
            SearchProvider::Static(p) => p.results.clone(),
        }
    }
}

/// True when a search result list is the single-element error sentinel.
pub fn is_error_sentinel(results: &[String]) -> bool {
    results
        .iter()
        .any(|s| s.contains("Error") || s.contains("Missing"))
}

// ── Google CSE ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GoogleCseSearch {
    client: Client,
    api_key: Option<String>,
    cse_id: Option<String>,
    num_results: u8,
    timeout_seconds: u64,
}

impl GoogleCseSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.google_api_key.clone(),
            cse_id: config.google_cse_id.clone(),
            num_results: config.num_results,
            timeout_seconds: config.timeout_seconds,
        }
    }

    async fn search(&self, query: &str) -> Vec<String> {
        match self.run(query).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(error = %e, "web search failed");
                let sentinel = match e {
                    FetchError::Search(msg) => msg,
                    other => format!("Error: {other}"),
                };
                vec![sentinel]
            }
        }
    }

    async fn run(&self, query: &str) -> Result<Vec<String>, FetchError> {
        let (Some(key), Some(cx)) = (&self.api_key, &self.cse_id) else {
            return Err(FetchError::Search(
                "Error: Missing Google API credentials.".to_string(),
            ));
        };

        debug!(%query, num = self.num_results, "running web search");

        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .timeout(std::time::Duration::from_secs(self.timeout_seconds))
            .query(&[
                ("q", query),
                ("key", key.as_str()),
                ("cx", cx.as_str()),
                ("num", &self.num_results.to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Search(format!("Error: Google API request failed: {e}")))?;

        let parsed = response.json::<SearchResponse>().await.map_err(|e| {
            FetchError::Search(format!("Error: Processing search results failed: {e}"))
        })?;

        let urls: Vec<String> = parsed
            .items
            .into_iter()
            .filter_map(|item| item.link)
            .collect();

        if urls.is_empty() {
            debug!("no result URLs in search response");
        } else {
            debug!(count = urls.len(), "search returned URLs");
        }
        Ok(urls)
    }
}

// ── Static fixture ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StaticSearch {
    results: Vec<String>,
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_return_sentinel() {
        let provider = SearchProvider::GoogleCse(GoogleCseSearch {
            client: Client::new(),
            api_key: None,
            cse_id: None,
            num_results: 5,
            timeout_seconds: 10,
        });
        let results = provider.search("anything").await;
        assert_eq!(results, vec!["Error: Missing Google API credentials.".to_string()]);
        assert!(is_error_sentinel(&results));
    }

    #[tokio::test]
    async fn static_provider_returns_fixture() {
        let provider = SearchProvider::fixed(vec!["https://a.example".into()]);
        assert_eq!(provider.search("q").await, vec!["https://a.example".to_string()]);
    }

    #[test]
    fn sentinel_detection() {
        assert!(is_error_sentinel(&["Error: Google API request failed: timeout".into()]));
        assert!(is_error_sentinel(&["Missing credentials".into()]));
        assert!(!is_error_sentinel(&["https://example.com".into()]));
        assert!(!is_error_sentinel(&[]));
    }

    #[test]
    fn response_parses_without_items() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn response_parses_items_with_links() {
        let json = r#"{"items":[{"link":"https://a"},{"title":"no link"},{"link":"https://b"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let urls: Vec<_> = parsed.items.into_iter().filter_map(|i| i.link).collect();
        assert_eq!(urls, vec!["https://a", "https://b"]);
    }
}

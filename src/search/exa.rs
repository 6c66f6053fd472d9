//! Exa provider: neural search, the chain's last resort.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::search::{SearchError, SearchHit, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://api.exa.ai";

pub struct ExaProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl ExaProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: SecretString, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for ExaProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        _recency_days: u32,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = ExaRequest {
            query,
            use_autoprompt: true,
            num_results: max_results,
            kind: "neural",
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimited(429));
        }
        if !status.is_success() {
            return Err(SearchError::Api(status.as_u16()));
        }

        let body: ExaResponse = response.json().await?;
        let hits = body
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                body: r.text.or(r.snippet).unwrap_or_default(),
                url: r.url.unwrap_or_default(),
            })
            .collect();

        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "exa"
    }
}

#[derive(Debug, Serialize)]
struct ExaRequest<'a> {
    query: &'a str,
    #[serde(rename = "useAutoprompt")]
    use_autoprompt: bool,
    #[serde(rename = "numResults")]
    num_results: usize,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

//! Tavily provider: general web search with a recency filter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::search::{SearchError, SearchHit, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl TavilyProvider {
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
impl SearchProvider for TavilyProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        recency_days: u32,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = TavilyRequest {
            api_key: self.api_key.expose_secret(),
            query,
            search_depth: "advanced",
            max_results,
            include_answer: true,
            days: recency_days,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        // 432 is Tavily's out-of-quota variant of 429.
        if status == 429 || status == 432 {
            return Err(SearchError::RateLimited(status));
        }
        if !(200..300).contains(&status) {
            return Err(SearchError::Api(status));
        }

        let body: TavilyResponse = response.json().await?;
        let mut hits = Vec::new();

        if let Some(answer) = body.answer.filter(|a| !a.is_empty()) {
            hits.push(SearchHit {
                title: "Tavily AI Summary".to_string(),
                body: answer,
                url: String::new(),
            });
        }

        for r in body.results {
            hits.push(SearchHit {
                title: r.title,
                body: r.content,
                url: r.url,
            });
        }

        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
    include_answer: bool,
    days: u32,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

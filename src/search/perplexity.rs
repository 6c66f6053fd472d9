//! Perplexity provider, the chain's preferred tier.
//!
//! Asks the `sonar` model for a sourced answer and surfaces it as a single
//! synthetic hit whose body carries the full summary text.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::search::{SearchError, SearchHit, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

pub struct PerplexityProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl PerplexityProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: SecretString, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(45))
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
impl SearchProvider for PerplexityProvider {
    async fn search(
        &self,
        query: &str,
        _max_results: usize,
        recency_days: u32,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = SonarRequest {
            model: "sonar",
            messages: vec![
                SonarMessage {
                    role: "system",
                    content: "你是一个专业的AI研究助手。请针对用户的查询提供详细、准确且带有来源摘要的回答。",
                },
                SonarMessage {
                    role: "user",
                    content: query,
                },
            ],
            temperature: 0.2,
            search_recency_filter: recency_filter(recency_days),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
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

        let body: SonarResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![SearchHit {
            title: "Perplexity AI Summary".to_string(),
            body: content,
            url: "https://perplexity.ai".to_string(),
        }])
    }

    fn name(&self) -> &'static str {
        "perplexity"
    }
}

fn recency_filter(recency_days: u32) -> &'static str {
    match recency_days {
        0..=1 => "day",
        2..=7 => "week",
        _ => "month",
    }
}

#[derive(Debug, Serialize)]
struct SonarRequest<'a> {
    model: &'a str,
    messages: Vec<SonarMessage<'a>>,
    temperature: f32,
    search_recency_filter: &'static str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SonarMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct SonarResponse {
    choices: Vec<SonarChoice>,
}

#[derive(Debug, Deserialize)]
struct SonarChoice {
    message: SonarChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct SonarChoiceMessage {
    content: String,
}

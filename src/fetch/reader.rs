//! Readable-text retrieval through a content-extraction reader proxy.
//!
//! The proxy (r.jina.ai by default) renders JS-heavy pages into plain text,
//! which makes the response length a usable quality signal: error and stub
//! pages come back short.

use thiserror::Error;

use crate::config::FetchConfig;
use crate::retry::{RetryPolicy, Transient};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reader returned HTTP {0}")]
    Status(u16),
    #[error("content too short ({0} chars)")]
    TooShort(usize),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            // Timeouts and resets surface as transport errors.
            FetchError::Transport(_) => true,
            FetchError::Status(status) => *status >= 500,
            // A short page is a content-quality failure; retrying the same
            // URL returns the same stub. The next tier handles it.
            FetchError::TooShort(_) => false,
        }
    }
}

pub struct ReaderClient {
    client: reqwest::Client,
    base_url: String,
    min_content_length: usize,
    content_max_chars: usize,
    retry: RetryPolicy,
}

impl ReaderClient {
    pub fn new(config: &FetchConfig, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(std::time::Duration::from_secs(config.fetch_timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.reader_base_url.clone(),
            min_content_length: config.min_content_length,
            content_max_chars: config.content_max_chars,
            retry,
        }
    }

    /// Fetch `url` through the reader proxy and return its readable text,
    /// truncated to the configured cap.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.retry.run(|| self.fetch_once(url)).await
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, url))
            // Force the proxy to fetch the live page, not its cache.
            .header("x-no-cache", "true")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut text = response.text().await?;
        let char_count = text.chars().count();
        if char_count < self.min_content_length {
            return Err(FetchError::TooShort(char_count));
        }

        if char_count > self.content_max_chars {
            text = text.chars().take(self.content_max_chars).collect();
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_not_transient() {
        assert!(!FetchError::TooShort(120).is_transient());
    }

    #[test]
    fn gateway_errors_are_transient() {
        assert!(FetchError::Status(502).is_transient());
        assert!(!FetchError::Status(404).is_transient());
    }
}

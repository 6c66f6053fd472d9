//! Priority-ordered search provider chain.
//!
//! Three third-party backends sit behind one `search` call: Perplexity
//! (summarization), Tavily (general web, time-filterable) and Exa (neural).
//! A provider is only active when its API key is present; the chain falls
//! through on failure or an empty result and returns an empty list only when
//! every active provider has failed. Callers treat an empty list as "no
//! information", never as an error.

pub mod exa;
pub mod perplexity;
pub mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Secrets;
use crate::retry::{RetryPolicy, Transient};

/// One search result. Ephemeral: consumed immediately by extraction or
/// report assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("provider rate-limited (HTTP {0})")]
    RateLimited(u16),
    #[error("provider returned HTTP {0}")]
    Api(u16),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Transient for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            // Rate limits don't clear within a backoff window; fall through
            // to the next provider instead of hammering this one.
            SearchError::RateLimited(_) => false,
            SearchError::Api(status) => *status >= 500,
            SearchError::Transport(_) => true,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        recency_days: u32,
    ) -> Result<Vec<SearchHit>, SearchError>;

    fn name(&self) -> &'static str;
}

pub struct SearchChain {
    providers: Vec<Box<dyn SearchProvider>>,
    retry: RetryPolicy,
}

impl SearchChain {
    pub fn new(providers: Vec<Box<dyn SearchProvider>>, retry: RetryPolicy) -> Self {
        Self { providers, retry }
    }

    /// Build the chain from whichever API keys are present, preferred first.
    pub fn from_secrets(secrets: &Secrets, retry: RetryPolicy) -> Self {
        let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();

        if let Some(key) = &secrets.perplexity_api_key {
            providers.push(Box::new(perplexity::PerplexityProvider::new(key.clone())));
            info!("Perplexity provider active (preferred)");
        }
        if let Some(key) = &secrets.tavily_api_key {
            providers.push(Box::new(tavily::TavilyProvider::new(key.clone())));
            info!("Tavily provider active (fallback)");
        }
        if let Some(key) = &secrets.exa_api_key {
            providers.push(Box::new(exa::ExaProvider::new(key.clone())));
            info!("Exa provider active (last resort)");
        }

        if providers.is_empty() {
            warn!("No search API keys configured — search rescue and radar scans disabled");
        }

        Self::new(providers, retry)
    }

    pub fn is_enabled(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Try each provider in priority order. Empty result only when all fail.
    pub async fn search(&self, query: &str, max_results: usize, recency_days: u32) -> Vec<SearchHit> {
        for provider in &self.providers {
            let outcome = self
                .retry
                .run(|| provider.search(query, max_results, recency_days))
                .await;

            match outcome {
                Ok(hits) if !hits.is_empty() => {
                    debug!(
                        provider = provider.name(),
                        hits = hits.len(),
                        query,
                        "Search succeeded"
                    );
                    return hits;
                }
                Ok(_) => {
                    debug!(provider = provider.name(), query, "No hits — falling through");
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        query,
                        "Provider failed — falling through"
                    );
                }
            }
        }

        Vec::new()
    }
}

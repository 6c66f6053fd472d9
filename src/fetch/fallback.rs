//! Tiered fallback resolution for a single source.
//!
//! Reader proxies are flaky for JS-heavy pages, RSS backups are steadier but
//! not always present, and a search call is the only channel that returns
//! *something* when the site itself is unreachable. Tiers are tried in that
//! order; the first one yielding enough content wins.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Source;
use crate::fetch::reader::ReaderClient;
use crate::fetch::{FetchResult, FetchTier};
use crate::search::SearchChain;

const RESCUE_MAX_RESULTS: usize = 3;
const RESCUE_RECENCY_DAYS: u32 = 3;

pub struct TieredResolver {
    reader: ReaderClient,
    search: Arc<SearchChain>,
}

impl TieredResolver {
    pub fn new(reader: ReaderClient, search: Arc<SearchChain>) -> Self {
        Self { reader, search }
    }

    /// Primary fetch → backup fetch → search rescue. Returns a `None`-tier
    /// result only when every tier has failed.
    pub async fn resolve(&self, source: &Source) -> FetchResult {
        match self.reader.fetch(&source.primary_url).await {
            Ok(content) => {
                info!(source = %source.name, tier = "primary", chars = content.chars().count(), "Tier succeeded");
                return FetchResult {
                    source_name: source.name.clone(),
                    content: Some(content),
                    tier: FetchTier::Primary,
                };
            }
            Err(e) => {
                warn!(source = %source.name, tier = "primary", error = %e, "Tier failed");
            }
        }

        if let Some(backup_url) = &source.backup_url {
            match self.reader.fetch(backup_url).await {
                Ok(content) => {
                    info!(source = %source.name, tier = "backup", chars = content.chars().count(), "Tier succeeded");
                    return FetchResult {
                        source_name: source.name.clone(),
                        content: Some(content),
                        tier: FetchTier::Backup,
                    };
                }
                Err(e) => {
                    warn!(source = %source.name, tier = "backup", error = %e, "Tier failed");
                }
            }
        }

        if self.search.is_enabled() {
            let query = rescue_query(&source.name);
            let hits = self
                .search
                .search(&query, RESCUE_MAX_RESULTS, RESCUE_RECENCY_DAYS)
                .await;

            if !hits.is_empty() {
                // Concatenated titles+snippets stand in for the page text.
                let content = hits
                    .iter()
                    .map(|h| format!("Title: {}\nSnippet: {}", h.title, h.body))
                    .collect::<Vec<_>>()
                    .join("\n");

                info!(source = %source.name, tier = "search_rescue", hits = hits.len(), "Tier succeeded");
                return FetchResult {
                    source_name: source.name.clone(),
                    content: Some(content),
                    tier: FetchTier::SearchRescue,
                };
            }

            warn!(source = %source.name, tier = "search_rescue", "Tier failed");
        }

        warn!(source = %source.name, "All fetch tiers failed");
        FetchResult::failed(source.name.clone())
    }
}

/// Generic query approximating what the source would have shown today.
fn rescue_query(source_name: &str) -> String {
    let today = chrono::Local::now().format("%Y-%m-%d");
    format!("{source_name} 热门 AI 科技内容 {today}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescue_query_names_the_source_and_day() {
        let q = rescue_query("Hacker News");
        assert!(q.starts_with("Hacker News"));
        assert!(q.contains("热门 AI 科技内容"));
        // Trailing date in YYYY-MM-DD form.
        let date = q.rsplit(' ').next().unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(date.matches('-').count(), 2);
    }
}

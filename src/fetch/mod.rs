//! Concurrent source fetching.
//!
//! Each registered source runs through the tiered fallback resolver inside a
//! bounded worker pool with a per-source timeout. One dead source degrades
//! coverage, never availability: panics, errors and timeouts are recorded as
//! a failed result for that source alone.

pub mod fallback;
pub mod reader;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{FetchConfig, Source};
use crate::fetch::fallback::TieredResolver;

/// Which fallback level produced a source's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTier {
    Primary,
    Backup,
    SearchRescue,
    None,
}

/// Outcome of resolving one source. Created once per source per run and
/// discarded after keyword extraction. `tier == None` implies no content.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub source_name: String,
    pub content: Option<String>,
    pub tier: FetchTier,
}

impl FetchResult {
    pub fn failed(source_name: String) -> Self {
        Self {
            source_name,
            content: None,
            tier: FetchTier::None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.content.is_some()
    }
}

/// Resolve all sources concurrently. The pool admits at most
/// `max_concurrent_fetches` in-flight resolutions; each gets
/// `fetch_timeout_seconds` of wall clock once admitted.
pub async fn fetch_all(
    resolver: Arc<TieredResolver>,
    sources: &[Source],
    config: &FetchConfig,
) -> HashMap<String, FetchResult> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
    let per_source_timeout = Duration::from_secs(config.fetch_timeout_seconds);

    let mut tasks = JoinSet::new();
    for source in sources.iter().cloned() {
        let resolver = Arc::clone(&resolver);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return FetchResult::failed(source.name),
            };

            match tokio::time::timeout(per_source_timeout, resolver.resolve(&source)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        source = %source.name,
                        timeout_s = per_source_timeout.as_secs(),
                        "Source fetch timed out"
                    );
                    FetchResult::failed(source.name)
                }
            }
        });
    }

    let mut results: HashMap<String, FetchResult> = HashMap::with_capacity(sources.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                results.insert(result.source_name.clone(), result);
            }
            Err(e) => {
                // The panicked task can't tell us which source it was; the
                // backfill below records it as failed.
                warn!(error = %e, "Fetch task aborted");
            }
        }
    }

    for source in sources {
        if !results.contains_key(&source.name) {
            results.insert(source.name.clone(), FetchResult::failed(source.name.clone()));
        }
    }

    let resolved = results.values().filter(|r| r.is_resolved()).count();
    info!(resolved, total = sources.len(), "Source fetch complete");

    results
}

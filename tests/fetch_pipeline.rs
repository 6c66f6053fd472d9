//! Fetch-tier behavior against a mocked reader proxy and search backend.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trend_radar::config::{FetchConfig, Source};
use trend_radar::fetch::fallback::TieredResolver;
use trend_radar::fetch::reader::ReaderClient;
use trend_radar::fetch::{self, FetchTier};
use trend_radar::retry::RetryPolicy;
use trend_radar::search::tavily::TavilyProvider;
use trend_radar::search::SearchChain;

fn fetch_config(reader_base: &str, timeout_seconds: u64) -> FetchConfig {
    FetchConfig {
        max_concurrent_fetches: 5,
        fetch_timeout_seconds: timeout_seconds,
        min_content_length: 500,
        content_max_chars: 8000,
        reader_base_url: format!("{reader_base}/read/"),
    }
}

fn no_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(1),
    }
}

fn source(name: &str, primary: &str, backup: Option<&str>) -> Source {
    Source {
        name: name.to_string(),
        tag: "硬核技术".to_string(),
        primary_url: primary.to_string(),
        backup_url: backup.map(str::to_string),
    }
}

fn empty_chain() -> Arc<SearchChain> {
    Arc::new(SearchChain::new(Vec::new(), no_retry()))
}

fn long_page() -> String {
    "热榜内容 trending entry ".repeat(40)
}

#[tokio::test]
async fn primary_tier_wins_when_the_page_is_real() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/read/primary-page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_page()))
        .mount(&server)
        .await;

    let reader = ReaderClient::new(&fetch_config(&server.uri(), 30), no_retry());
    let resolver = TieredResolver::new(reader, empty_chain());

    let result = resolver
        .resolve(&source("Hacker News", "primary-page", Some("backup-page")))
        .await;

    assert_eq!(result.tier, FetchTier::Primary);
    assert!(result.content.unwrap().contains("trending entry"));
}

#[tokio::test]
async fn short_primary_falls_through_to_backup() {
    let server = MockServer::start().await;
    // A 200 with a stub-sized body must count as a tier failure.
    Mock::given(method("GET"))
        .and(path("/read/primary-page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("error page"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/read/backup-page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_page()))
        .mount(&server)
        .await;

    let reader = ReaderClient::new(&fetch_config(&server.uri(), 30), no_retry());
    let resolver = TieredResolver::new(reader, empty_chain());

    let result = resolver
        .resolve(&source("Product Hunt", "primary-page", Some("backup-page")))
        .await;

    assert_eq!(result.tier, FetchTier::Backup);
}

#[tokio::test]
async fn search_rescue_resolves_an_unreachable_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/read/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"title": "AI 周报", "content": "本周热点速览", "url": "https://example.com/1"}
            ]
        })))
        .mount(&server)
        .await;

    let reader = ReaderClient::new(&fetch_config(&server.uri(), 30), no_retry());
    let tavily = TavilyProvider::with_base_url(
        SecretString::from("test-key-0123456789".to_string()),
        &server.uri(),
    );
    let chain = Arc::new(SearchChain::new(vec![Box::new(tavily)], no_retry()));
    let resolver = TieredResolver::new(reader, chain);

    let result = resolver.resolve(&source("微博热搜-科技", "gone", None)).await;

    assert_eq!(result.tier, FetchTier::SearchRescue);
    let content = result.content.unwrap();
    assert!(content.contains("Title: AI 周报"));
    assert!(content.contains("Snippet: 本周热点速览"));
}

#[tokio::test]
async fn all_tiers_failing_yields_a_none_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/read/.*"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let reader = ReaderClient::new(&fetch_config(&server.uri(), 30), no_retry());
    let resolver = TieredResolver::new(reader, empty_chain());

    let result = resolver
        .resolve(&source("CSDN热榜", "gone", Some("also-gone")))
        .await;

    assert_eq!(result.tier, FetchTier::None);
    assert!(result.content.is_none());
}

#[tokio::test]
async fn one_hung_source_does_not_block_its_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/read/fast-page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/read/dead-page"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    // Hangs well past the per-source timeout.
    Mock::given(method("GET"))
        .and(path("/read/slow-page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(long_page())
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let config = fetch_config(&server.uri(), 1);
    let reader = ReaderClient::new(&config, no_retry());
    let resolver = Arc::new(TieredResolver::new(reader, empty_chain()));

    let sources = vec![
        source("快源", "fast-page", None),
        source("挂源", "dead-page", None),
        source("慢源", "slow-page", None),
    ];

    let started = std::time::Instant::now();
    let results = fetch::fetch_all(resolver, &sources, &config).await;

    // Every source gets an entry; only the healthy one resolves.
    assert_eq!(results.len(), 3);
    assert!(results["快源"].is_resolved());
    assert_eq!(results["挂源"].tier, FetchTier::None);
    assert_eq!(results["慢源"].tier, FetchTier::None);

    // The batch finishes on the timeout, not on the slow source.
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn every_source_resolves_through_some_tier() {
    let server = MockServer::start().await;
    // First source: stub primary, healthy backup.
    Mock::given(method("GET"))
        .and(path("/read/stub-a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tiny"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/read/backup-a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_page()))
        .mount(&server)
        .await;
    // Second source: both pages dead, search rescue available.
    Mock::given(method("GET"))
        .and(path("/read/stub-b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tiny"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"title": "rescue", "content": "snippet", "url": ""}]
        })))
        .mount(&server)
        .await;

    let config = fetch_config(&server.uri(), 30);
    let reader = ReaderClient::new(&config, no_retry());
    let tavily = TavilyProvider::with_base_url(
        SecretString::from("test-key-0123456789".to_string()),
        &server.uri(),
    );
    let chain = Arc::new(SearchChain::new(vec![Box::new(tavily)], no_retry()));
    let resolver = Arc::new(TieredResolver::new(reader, chain));

    let sources = vec![
        source("甲源", "stub-a", Some("backup-a")),
        source("乙源", "stub-b", None),
    ];

    let results = fetch::fetch_all(resolver, &sources, &config).await;

    assert!(results.values().all(|r| r.is_resolved()));
    assert_eq!(results["甲源"].tier, FetchTier::Backup);
    assert_eq!(results["乙源"].tier, FetchTier::SearchRescue);
}

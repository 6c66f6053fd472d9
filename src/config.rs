use std::path::Path;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    pub llm: LlmConfig,
    pub dedup: DedupConfig,
    pub scan: ScanConfig,
    pub strategy: StrategyConfig,
    pub extraction: ExtractionConfig,
    pub report: ReportConfig,
    pub monitoring: MonitoringConfig,
    pub sources: Vec<Source>,
}

/// One trend source in the registry. Loaded at startup, immutable during a run.
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub name: String,
    /// Topical tag steering per-source keyword extraction (e.g. "硬核技术").
    pub tag: String,
    pub primary_url: String,
    #[serde(default)]
    pub backup_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_seconds: u64,
    /// Payloads shorter than this are treated as error/stub pages.
    pub min_content_length: usize,
    /// Fetched content is truncated to this many chars before extraction.
    pub content_max_chars: usize,
    pub reader_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub chat_model: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Max title similarity against recent history before a candidate is dropped.
    pub similarity_threshold: f64,
    pub recency_window_days: i64,
    pub history_cap: usize,
    pub history_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub watchlist: Vec<String>,
    pub efficiency_keywords: Vec<String>,
    pub pain_keywords: Vec<String>,
    pub radar_queries: Vec<String>,
    /// How many watchlist entries a random (non-directed) run scans.
    pub anchor_sample: usize,
    /// How many efficiency/pain keywords each route samples.
    pub route_sample: usize,
    /// Upper bound on the merged per-run keyword pool.
    pub keyword_pool_cap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub news_weight: f64,
    pub social_weight: f64,
    pub prompt_suffix: String,
}

/// Declarative noise-filtering vocabulary for keyword extraction.
/// Rendered into the extraction prompt and re-applied to model output.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub deny_terms: Vec<String>,
    pub allow_examples: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub deepseek_api_key: Option<SecretString>,
    pub perplexity_api_key: Option<SecretString>,
    pub tavily_api_key: Option<SecretString>,
    pub exa_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            deepseek_api_key: read_key("DEEPSEEK_API_KEY"),
            perplexity_api_key: read_key("PERPLEXITY_API_KEY"),
            tavily_api_key: read_key("TAVILY_API_KEY"),
            exa_api_key: read_key("EXA_API_KEY"),
        }
    }
}

/// Treat obviously truncated values (pasted fragments, placeholders) as absent.
fn read_key(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(v) if v.len() > 10 => Some(SecretString::from(v)),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from config/default.toml, overlaying environment variables for secrets.
    pub fn load() -> Result<(Self, Secrets)> {
        Self::load_from(Path::new("config/default.toml"))
    }

    pub fn load_from(config_path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_config() {
        let contents = std::fs::read_to_string("config/default.toml")
            .expect("config/default.toml should exist");
        let config: AppConfig = toml::from_str(&contents).expect("should parse");
        assert_eq!(config.fetch.max_concurrent_fetches, 5);
        assert_eq!(config.fetch.fetch_timeout_seconds, 30);
        assert_eq!(config.fetch.min_content_length, 500);
        assert_eq!(config.dedup.history_cap, 30);
        assert!(config.sources.len() >= 5);
    }

    #[test]
    fn backup_url_is_optional() {
        let toml_src = r#"
            name = "CSDN热榜"
            tag = "技术教程"
            primary_url = "https://blog.csdn.net/rank/list"
        "#;
        let source: Source = toml::from_str(toml_src).expect("should parse");
        assert!(source.backup_url.is_none());
    }

    #[test]
    fn short_env_values_read_as_absent() {
        // Placeholder-length strings must not activate a provider.
        std::env::set_var("TREND_RADAR_TEST_KEY", "short");
        assert!(read_key("TREND_RADAR_TEST_KEY").is_none());
        std::env::set_var("TREND_RADAR_TEST_KEY", "sk-0123456789abcdef");
        assert!(read_key("TREND_RADAR_TEST_KEY").is_some());
        std::env::remove_var("TREND_RADAR_TEST_KEY");
    }
}

//! Per-source keyword extraction.
//!
//! A model call distills 2–3 consumer-facing keywords from one source's
//! fetched text. The noise-filtering vocabulary is config data: it is
//! rendered into the prompt *and* re-applied to whatever the model returns,
//! so a prompt-ignoring response still comes out clean and the filter is
//! testable without a model in the loop. Extraction is independent per
//! source; a failure yields an empty set, never an error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::llm::ChatClient;
use crate::search::SearchHit;

const MAX_KEYWORDS_PER_SOURCE: usize = 3;
const MAX_KEYWORD_CHARS: usize = 30;
const MAX_ENTITY_CHARS: usize = 20;

/// Sentinel the model uses for "nothing relevant here".
const NO_CONTENT_SENTINEL: &str = "NONE";

const EXTRACTOR_PERSONA: &str =
    "你是一个敏锐的技术趋势捕手，擅长从杂乱的网页内容中提取有价值的技术关键词，并过滤掉无关的娱乐八卦。";

#[derive(Debug, Clone)]
pub struct ExtractionRules {
    deny_terms: Vec<String>,
    allow_examples: Vec<String>,
}

impl ExtractionRules {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            deny_terms: config.deny_terms.clone(),
            allow_examples: config.allow_examples.clone(),
        }
    }

    /// Clean a comma-separated model reply into the final keyword set.
    pub fn apply(&self, raw: &str) -> Vec<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.to_uppercase().contains(NO_CONTENT_SENTINEL) {
            return Vec::new();
        }

        trimmed
            .split([',', '，'])
            .map(str::trim)
            .filter(|k| !k.is_empty() && k.chars().count() < MAX_KEYWORD_CHARS)
            .filter(|k| !self.is_denied(k))
            .map(str::to_string)
            .take(MAX_KEYWORDS_PER_SOURCE)
            .collect()
    }

    fn is_denied(&self, keyword: &str) -> bool {
        let lower = keyword.to_lowercase();
        self.deny_terms.iter().any(|d| lower.contains(&d.to_lowercase()))
    }

    fn prompt_rules(&self) -> String {
        format!(
            r#"⚠️ 关键过滤规则（必须遵守）：
1. 🔴 **绝对排除底层技术**：严禁提取 {deny}。**我们只要给小白用的工具！**
2. 🟢 **只保留应用层**，例如：{allow}。
3. 排除娱乐明星和社会新闻。
4. 如果页面是 RSS XML 格式，请忽略 XML 标签，只提取 Title 中的技术名词。
5. 返回格式：只返回名词，用英文逗号分隔。如果不确定或无相关内容，返回 "{sentinel}"。"#,
            deny = self.deny_terms.join("、"),
            allow = self.allow_examples.join("、"),
            sentinel = NO_CONTENT_SENTINEL,
        )
    }
}

pub struct KeywordExtractor {
    llm: Arc<ChatClient>,
    rules: ExtractionRules,
}

impl KeywordExtractor {
    pub fn new(llm: Arc<ChatClient>, rules: ExtractionRules) -> Self {
        Self { llm, rules }
    }

    /// Extract up to 3 keywords from one source's content. Empty on failure
    /// or when the model reports nothing relevant.
    pub async fn extract(&self, content: &str, source_name: &str, tag: &str) -> Vec<String> {
        if content.is_empty() {
            return Vec::new();
        }

        let prompt = format!(
            "【{source_name} 热榜内容】\n{content}\n\n这是【{source_name}】今天的热榜或搜索摘要。\n请从中提取 2-3 个最符合\"{tag}\"领域的具体技术名词或产品名称。\n\n{rules}",
            rules = self.rules.prompt_rules(),
        );

        match self.llm.complete(EXTRACTOR_PERSONA, &prompt, 0.2).await {
            Ok(reply) => {
                let keywords = self.rules.apply(&reply);
                if keywords.is_empty() {
                    debug!(source = %source_name, "No relevant keywords");
                } else {
                    debug!(source = %source_name, keywords = ?keywords, "Keywords extracted");
                }
                keywords
            }
            Err(e) => {
                warn!(source = %source_name, error = %e, "Keyword extraction failed");
                Vec::new()
            }
        }
    }

    /// Distill 2–3 breaking entity names (products, models) from search hit
    /// titles gathered by the radar queries.
    pub async fn extract_hot_entities(&self, hits: &[SearchHit]) -> Vec<String> {
        if hits.is_empty() {
            return Vec::new();
        }

        let titles = hits
            .iter()
            .take(10)
            .map(|h| format!("- {}", h.title))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "【新闻标题列表】\n{titles}\n\n请从上述新闻标题中，提取 2-3 个当前最火的 AI 技术或产品名称。\n要求：\n1. 只返回具体名词，如 \"DeepSeek V3\", \"MCP\", \"Sora 2.0\"。\n2. 不要返回通用词（如 \"AI\", \"LLM\", \"Technology\"）。\n3. 输出格式：用英文逗号分隔，不要其他废话。"
        );

        match self.llm.complete("你是一个敏锐的技术趋势捕手。", &prompt, 0.1).await {
            Ok(reply) => reply
                .split([',', '，'])
                .map(str::trim)
                .filter(|e| !e.is_empty() && e.chars().count() < MAX_ENTITY_CHARS)
                .map(str::to_string)
                .take(MAX_KEYWORDS_PER_SOURCE)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Hot entity extraction failed");
                Vec::new()
            }
        }
    }
}

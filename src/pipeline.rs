//! The trend-radar run pipeline.
//!
//! One run walks four stages: broad scan (radar queries + concurrent source
//! fetch + keyword distillation), candidate planning, deep-scan verification
//! per surviving candidate, and the editor's final decision. Every stage
//! tolerates partial failure; the run only errors if the artifacts themselves
//! cannot be written.

use std::sync::Arc;

use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::config::{AppConfig, Secrets};
use crate::dedup::dedup_candidates;
use crate::extract::{ExtractionRules, KeywordExtractor};
use crate::fetch::{self, fallback::TieredResolver, reader::ReaderClient};
use crate::history::{HistoryEntry, HistoryStore, JsonFileHistory};
use crate::llm::ChatClient;
use crate::plan::{self, CandidateTopic, Planner};
use crate::report::{clean_text, FinalDecision, ReportWriter};
use crate::retry::RetryPolicy;
use crate::search::{SearchChain, SearchHit};

const SOCIAL_SITES: &str = "site:mp.weixin.qq.com OR site:xiaohongshu.com OR site:bilibili.com";
const EFFICIENCY_SITES: &str =
    "site:sspai.com OR site:36kr.com OR site:v2ex.com OR site:mp.weixin.qq.com";
const PAIN_SITES: &str = "site:v2ex.com OR site:reddit.com OR site:mp.weixin.qq.com";

pub struct RunArtifacts {
    pub report_path: std::path::PathBuf,
    pub decision_path: std::path::PathBuf,
    pub primary_topic: String,
}

pub struct TrendRadar {
    config: AppConfig,
    search: Arc<SearchChain>,
    resolver: Arc<TieredResolver>,
    llm: Option<Arc<ChatClient>>,
    history: Box<dyn HistoryStore>,
    reports: ReportWriter,
}

impl TrendRadar {
    pub fn new(config: AppConfig, secrets: &Secrets) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        let search = Arc::new(SearchChain::from_secrets(secrets, retry));
        let reader = ReaderClient::new(&config.fetch, retry);
        let resolver = Arc::new(TieredResolver::new(reader, Arc::clone(&search)));

        let llm = match &secrets.deepseek_api_key {
            Some(key) => Some(Arc::new(ChatClient::new(key.clone(), &config.llm))),
            None => {
                warn!("DEEPSEEK_API_KEY not set — planning and extraction degrade to fallbacks");
                None
            }
        };

        let history: Box<dyn HistoryStore> = Box::new(JsonFileHistory::new(
            &config.dedup.history_path,
            config.dedup.history_cap,
        ));
        let reports = ReportWriter::new(&config.report.dir);

        Self {
            config,
            search,
            resolver,
            llm,
            history,
            reports,
        }
    }

    /// Swap the history store (tests inject the in-memory fake).
    pub fn with_history(mut self, history: Box<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    /// Execute one full discovery run.
    pub async fn run(&self, directed_topic: Option<&str>) -> Result<RunArtifacts> {
        let mode_info = match directed_topic {
            Some(t) => format!("定向搜索: {t}"),
            None => self.config.strategy.name.clone(),
        };
        info!(mode = %mode_info, "Trend radar starting");

        let history = self
            .history
            .load_recent(self.config.dedup.recency_window_days)
            .unwrap_or_default();

        // Stage 1: broad scan.
        let scan = self.broad_scan(directed_topic).await;

        // Stage 2: plan + dedup. Without a model there is nothing to plan
        // with; the fallback candidate keeps the pipeline moving.
        let candidates = match (&self.llm, scan.intel_digest.is_empty()) {
            (Some(llm), false) => {
                let planner = Planner::new(Arc::clone(llm));
                planner
                    .plan(&scan.intel_digest, &history, directed_topic)
                    .await
            }
            _ => {
                warn!("No planner input available — using fallback candidate");
                vec![plan::fallback_candidate()]
            }
        };
        let candidates =
            dedup_candidates(candidates, &history, self.config.dedup.similarity_threshold);

        // Stage 3: deep scan.
        let raw_intel = self.deep_scan(&candidates, directed_topic).await;

        // Stage 4: final decision.
        let analysis = self.final_decision(&raw_intel, &history, directed_topic).await;

        // Artifacts. The primary topic is the top-ranked survivor.
        let primary = candidates.first().cloned().unwrap_or_else(plan::fallback_candidate);
        let mut keywords = scan.keywords;
        for entity in &scan.hot_entities {
            if !contains_ci(&keywords, entity) {
                keywords.push(entity.clone());
            }
        }

        let decision = FinalDecision {
            title: format!("{}：{}", primary.event, primary.angle),
            angle: primary.angle.clone(),
            value_line: format!(
                "围绕「{}」的{}选题，基于今日全网情报验证",
                primary.event, primary.angle
            ),
            keywords,
        };

        let report_path = self.reports.write_report(
            &mode_info,
            &self.config.strategy.prompt_suffix,
            &raw_intel,
            &analysis,
        )?;
        let decision_path = self.reports.write_decision(&decision)?;

        if let Err(e) = self
            .history
            .append(HistoryEntry::today(&primary.event, &primary.angle))
        {
            warn!(error = %e, "Failed to update topic history");
        }

        info!(topic = %primary.event, "Trend radar finished");
        Ok(RunArtifacts {
            report_path,
            decision_path,
            primary_topic: primary.event,
        })
    }

    /// Offline run: exercises prompt assembly and artifact writing without
    /// touching the network.
    pub fn run_dry(&self, directed_topic: Option<&str>) -> Result<RunArtifacts> {
        let primary = plan::fallback_candidate();
        let mode_info = match directed_topic {
            Some(t) => format!("定向搜索: {t} (dry run)"),
            None => format!("{} (dry run)", self.config.strategy.name),
        };

        let decision = FinalDecision {
            title: format!("{}：{}", primary.event, primary.angle),
            angle: primary.angle.clone(),
            value_line: "dry run 占位决策，未调用任何外部服务".to_string(),
            keywords: vec![primary.event.clone()],
        };

        let report_path = self.reports.write_report(
            &mode_info,
            &self.config.strategy.prompt_suffix,
            "（dry run，无情报）",
            "（dry run，无分析）",
        )?;
        let decision_path = self.reports.write_decision(&decision)?;

        Ok(RunArtifacts {
            report_path,
            decision_path,
            primary_topic: primary.event,
        })
    }

    // === Stage 1 ===

    async fn broad_scan(&self, directed_topic: Option<&str>) -> BroadScan {
        let mut pre_scan: Vec<SearchHit> = Vec::new();

        // Radar queries: 24h window, outside the watchlist bubble.
        if self.search.is_enabled() {
            for query in &self.config.scan.radar_queries {
                let hits = self.search.search(query, 2, 1).await;
                pre_scan.extend(hits);
            }
        }

        let extractor = self.llm.as_ref().map(|llm| {
            KeywordExtractor::new(
                Arc::clone(llm),
                ExtractionRules::from_config(&self.config.extraction),
            )
        });

        let hot_entities = match &extractor {
            Some(ex) => {
                let entities = ex.extract_hot_entities(&pre_scan).await;
                if !entities.is_empty() {
                    info!(entities = ?entities, "Radar locked onto breaking entities");
                }
                entities
            }
            None => Vec::new(),
        };

        // Concurrent source fetch, then serial per-source extraction in
        // registry order (model calls must not run concurrently).
        let fetched = fetch::fetch_all(
            Arc::clone(&self.resolver),
            &self.config.sources,
            &self.config.fetch,
        )
        .await;

        let mut keywords: Vec<String> = Vec::new();
        if let Some(ex) = &extractor {
            for source in &self.config.sources {
                let content = fetched
                    .get(&source.name)
                    .and_then(|r| r.content.as_deref());
                if let Some(content) = content {
                    for keyword in ex.extract(content, &source.name, &source.tag).await {
                        if !contains_ci(&keywords, &keyword) {
                            keywords.push(keyword);
                        }
                    }
                }
            }
        }
        keywords.truncate(self.config.scan.keyword_pool_cap);
        if !keywords.is_empty() {
            info!(keywords = ?keywords, "Fresh keywords from trending sources");
        }

        // A/B/C route searches feed the planning pool.
        if self.search.is_enabled() {
            let targets = self.build_targets(directed_topic, &hot_entities, &keywords);
            info!(targets = ?targets, "Anchor route scan targets");
            for target in &targets {
                for query in anchor_queries(target) {
                    pre_scan.extend(self.search.search(&query, 2, 7).await);
                }
            }

            // Sample both route pools up front; ThreadRng must not live
            // across an await point.
            let (mut efficiency, mut pain) = {
                let mut rng = rand::thread_rng();
                let efficiency: Vec<String> = self
                    .config
                    .scan
                    .efficiency_keywords
                    .choose_multiple(&mut rng, self.config.scan.route_sample)
                    .cloned()
                    .collect();
                let pain: Vec<String> = self
                    .config
                    .scan
                    .pain_keywords
                    .choose_multiple(&mut rng, self.config.scan.route_sample)
                    .cloned()
                    .collect();
                (efficiency, pain)
            };
            if let Some(topic) = directed_topic {
                efficiency.insert(0, format!("{topic} 效率神器"));
            }
            for keyword in &efficiency {
                let query = format!("{keyword} 推荐 {EFFICIENCY_SITES}");
                pre_scan.extend(self.search.search(&query, 2, 3).await);
            }

            if let Some(topic) = directed_topic {
                pain.insert(0, format!("{topic} 避坑 吐槽"));
            }
            for keyword in &pain {
                let query = format!("{keyword} 吐槽 避坑 {PAIN_SITES}");
                pre_scan.extend(self.search.search(&query, 2, 3).await);
            }
        }

        BroadScan {
            intel_digest: intel_digest(&pre_scan),
            keywords,
            hot_entities,
        }
    }

    fn build_targets(
        &self,
        directed_topic: Option<&str>,
        hot_entities: &[String],
        fresh_keywords: &[String],
    ) -> Vec<String> {
        match directed_topic {
            Some(topic) => {
                // Directed mode stays focused: the topic first, breaking
                // entities allowed to tag along.
                let mut targets = vec![topic.to_string()];
                for entity in hot_entities {
                    if !topic.to_lowercase().contains(&entity.to_lowercase()) {
                        targets.push(entity.clone());
                    }
                }
                targets.truncate(4);
                targets
            }
            None => {
                let mut rng = rand::thread_rng();
                let mut targets: Vec<String> = self
                    .config
                    .scan
                    .watchlist
                    .choose_multiple(&mut rng, self.config.scan.anchor_sample)
                    .cloned()
                    .collect();
                // Fresh signals outrank the static watchlist.
                for keyword in fresh_keywords {
                    if !contains_ci(&targets, keyword) {
                        targets.insert(0, keyword.clone());
                    }
                }
                for entity in hot_entities {
                    if !contains_ci(&targets, entity) {
                        targets.insert(0, entity.clone());
                    }
                }
                targets.truncate(6);
                targets
            }
        }
    }

    // === Stage 3 ===

    async fn deep_scan(
        &self,
        candidates: &[CandidateTopic],
        directed_topic: Option<&str>,
    ) -> String {
        if !self.search.is_enabled() {
            return "（搜索服务不可用，无深度情报）".to_string();
        }

        let mut sections: Vec<String> = Vec::new();

        for candidate in candidates {
            let is_core = is_core_topic(candidate, directed_topic);
            // Directed runs give the core topic the full quota and starve
            // the rest, so the verdict stays on-topic.
            let (social_quota, news_quota) = match directed_topic {
                Some(_) if !is_core => (2, 1),
                _ => (4, 2),
            };

            info!(event = %candidate.event, angle = %candidate.angle, "Deep-scanning candidate");
            let mut section = vec![format!(
                "### 🎯 选题: {} ({})",
                candidate.event, candidate.angle
            )];

            if !candidate.social_query.is_empty() {
                let query = format!("{} {SOCIAL_SITES}", candidate.social_query);
                let hits = self.search.search(&query, social_quota, 3).await;
                if !hits.is_empty() {
                    section.push(format!(
                        "\n**💬 用户反馈** ({}) [权重 {}]",
                        candidate.social_query, self.config.strategy.social_weight
                    ));
                    for hit in &hits {
                        section.push(render_hit(hit, true));
                    }
                }
            }

            if !candidate.news_query.is_empty() {
                let hits = self.search.search(&candidate.news_query, news_quota, 7).await;
                if !hits.is_empty() {
                    section.push(format!(
                        "\n**📰 官方信息** ({}) [权重 {}]",
                        candidate.news_query, self.config.strategy.news_weight
                    ));
                    for hit in &hits {
                        section.push(render_hit(hit, false));
                    }
                }
            }

            sections.push(section.join("\n"));
        }

        sections.join("\n\n---\n\n")
    }

    // === Stage 4 ===

    async fn final_decision(
        &self,
        raw_intel: &str,
        history: &[HistoryEntry],
        directed_topic: Option<&str>,
    ) -> String {
        let llm = match &self.llm {
            Some(llm) => llm,
            None => return fallback_analysis(),
        };

        let system = editor_prompt(
            &plan::history_digest(history),
            directed_topic,
            &self.config.strategy.name,
            &self.config.strategy.prompt_suffix,
        );
        let user = format!("【深度验证情报】\n{raw_intel}");

        match llm.complete(&system, &user, 0.7).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "Final decision call failed — using fallback analysis");
                fallback_analysis()
            }
        }
    }
}

struct BroadScan {
    intel_digest: String,
    keywords: Vec<String>,
    hot_entities: Vec<String>,
}

fn contains_ci(haystack: &[String], needle: &str) -> bool {
    let lower = needle.to_lowercase();
    haystack.iter().any(|h| h.to_lowercase().contains(&lower))
}

/// Queries that wake up a "zombie" anchor: hidden features and the latest
/// release notes, in both languages.
fn anchor_queries(target: &str) -> [String; 3] {
    [
        format!("{target} 隐藏功能 玩法 教程 2025"),
        format!("{target} new features latest update"),
        format!("{target} 最新功能 上线 发布 2025"),
    ]
}

fn intel_digest(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("- {}: {}", clean_text(&h.title, 60), clean_text(&h.body, 80)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_hit(hit: &SearchHit, with_body: bool) -> String {
    let title = clean_text(&hit.title, 60);
    let body = clean_text(&hit.body, 100);
    match (with_body, hit.url.is_empty()) {
        (true, false) => format!("- **{title}**: {body} [[来源]({})]", hit.url),
        (true, true) => format!("- **{title}**: {body}"),
        (false, false) => format!("- {title} [[来源]({})]", hit.url),
        (false, true) => format!("- {title}"),
    }
}

fn is_core_topic(candidate: &CandidateTopic, directed_topic: Option<&str>) -> bool {
    match directed_topic {
        Some(topic) => {
            let t = topic.to_lowercase();
            let e = candidate.event.to_lowercase();
            !e.is_empty() && (t.contains(&e) || e.contains(&t))
        }
        None => false,
    }
}

fn fallback_analysis() -> String {
    "（主编审核不可用：保留全部候选选题，建议人工复核深度验证情报后定稿）".to_string()
}

fn editor_prompt(
    history_digest: &str,
    directed_topic: Option<&str>,
    strategy_name: &str,
    strategy_suffix: &str,
) -> String {
    let user_intent = match directed_topic {
        Some(topic) => format!(
            r#"
👤 **用户意图（最高优先级）**：
用户明确希望写关于【{topic}】的内容。
**决策原则**：
1. 默认优先：在同等价值下，优先选择与【{topic}】相关的选题。
2. 允许抗旨：只有当扫描到的其他热点具有**极高的爆款潜质**时，你才建议放弃用户指定主题。
3. 混合策略：如果可能，尝试将【{topic}】与其他热点结合。
"#
        ),
        None => String::new(),
    };

    format!(
        r#"你叫"王往AI"，专注 AI 工作流的硬核博主。
请筛选 3 个【价值最高】的选题，**必须覆盖至少 2 种心理策略**以保证多样性。

## 价值公式
**选题价值** = (信息差 × 认知冲击) + (痛点强度 × 解决效率) - 阅读门槛

## 心理学策略（3 个选题必须覆盖至少 2 路）
1. **锚点效应 (借势顶流)**：借助 DeepSeek/Cursor/Gemini 等顶流产品的知名度。
2. **即时满足 (效能神器)**：让用户觉得"看完就能用"。如"3分钟学会"、"免费白嫖"。
3. **损失厌恶 (避坑/认知)**：触发用户"害怕踩坑"或"害怕落后"的心理。
{user_intent}
❌ **严格去重**：以下是最近已写过的选题：
{history_digest}

**绝对禁止**再次选择与上述极其相似的选题！必须换个工具或换个角度！

✨ **扶持新词**：请优先关注情报中提到的【生僻技术名词】（如 AutoGLM, Dayflow 等），如果它们有价值，优先入选。

当前策略：【{strategy_name}】
{strategy_suffix}

输出格式：
### 选题 1：[标题] (需极具吸引力)
* **心理锚点**：[锚点效应 / 即时满足 / 损失厌恶]
* **核心价值**：[用户看完能得到什么？新知？技能？避坑？]
* **热度评级**：[⭐⭐⭐⭐⭐]
* **推荐理由**：[为什么这个选题现在值得写？]
---
## 今日主推
告诉我不写会后悔的那个 (价值最高的)，并说明它命中了哪个心理锚点。"#
    )
}

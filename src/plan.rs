//! Candidate topic planning.
//!
//! One model call turns the run's aggregated intelligence into 3 candidate
//! topics with search queries attached. The output goes through the tolerant
//! parser; if nothing usable comes back the planner degrades to a hardcoded
//! default candidate so downstream stages always have work.

use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::history::HistoryEntry;
use crate::llm::ChatClient;
use crate::parser;

/// A proposed publishable subject, before dedup/ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateTopic {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub news_query: String,
    #[serde(default)]
    pub social_query: String,
}

/// The topic the pipeline falls back to when planning produces nothing.
pub fn fallback_candidate() -> CandidateTopic {
    CandidateTopic {
        event: "DeepSeek".to_string(),
        angle: "避坑".to_string(),
        news_query: "DeepSeek V3".to_string(),
        social_query: "DeepSeek 幻觉".to_string(),
    }
}

/// History rendered for prompt injection.
pub fn history_digest(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "无（这是第一篇）".to_string();
    }
    history
        .iter()
        .map(|h| format!("- {}: {} ({})", h.date, h.topic, h.angle))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull candidates out of whatever shape the model chose: a bare array or
/// an `{"events": [...]}` wrapper. Entries without an event are dropped.
pub fn candidates_from_value(value: Value) -> Vec<CandidateTopic> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<CandidateTopic>(item).ok())
        .filter(|c| !c.event.trim().is_empty())
        .collect()
}

fn plan_prompt(history_digest: &str, directed_topic: Option<&str>) -> String {
    let today = Local::now().format("%Y-%m-%d");

    let intent_instruction = match directed_topic {
        Some(topic) => format!(
            r#"
👤 **用户核心指令**：
用户指定了主题【{topic}】。
1. 你生成的 3 个选题中，**必须包含**至少 1 个与【{topic}】深度相关的选题（作为 A 方案）。
2. 同时，请从情报池中挖掘另外 1-2 个**高潜质**的随机热点或关联话题（作为 Plan B/C），与用户指定主题进行"价值PK"。
3. 如果发现【{topic}】目前毫无新意（无新闻、无痛点），你可以"抗旨"，全推其他更有价值的热点，但必须在分析中说明理由。
"#
        ),
        None => String::new(),
    };

    format!(
        r#"📅 今天是 {today}。你必须只关注最近 3-7 天内发生的 AI 圈最新大事件。
❗ 绝对禁止报道 2024 年或更早的旧闻（如 DeepSeek R1、GPT-4 发布等历史事件）。
{intent_instruction}
【历史发文记录 (最近7天)】
{history_digest}
⚠️ 查重指令：如果上述历史记录中已存在相似选题，请必须调整切入角度（例如：从"新闻报道"转向"深度实测"或"避坑指南"）。如果无法差异化，请直接丢弃该选题。

你是"王往AI"的首席内容策略官。
请基于【全网情报】和【心理学策略】，挖掘 3 个最具"爆款潜质"的选题方向。

## 价值公式 (流量风暴版)
**选题价值** = (社会热度 × 好奇心) + (情绪共鸣 × 参与度) - 认知门槛

## 心理学三路策略（流量加强版）
1. **A路 - 锚点效应 (借势顶流)**：借助 DeepSeek/Cursor/Gemini 等顶流产品的知名度，关注其"隐藏功能"或"最新玩法"。
2. **B路 - 即时满足 (效能神器)**：寻找真正的"效率神器"，主打"3分钟上手"、"下班早走1小时"。
3. **C路 - 损失厌恶 (避坑/认知)**：寻找"智商税"、"翻车现场"、"平替"，或解读新趋势、新硬件，让用户害怕"落后于时代"。

决策标准：
- ✅ **保留**：DeepSeek 隐藏玩法（锚点）、免费画架构图（即时满足）、Cursor 收费避坑（损失厌恶）、Google AI 耳机体验（认知升级）。
- ❌ **剔除**：纯枯燥的融资新闻、过于学术的论文解读、毫无新意的"正确的废话"、冷门无名小工具。

输出格式（严格 JSON）：
[
    {{
        "event": "选题核心词 (如: DeepSeek)",
        "angle": "切入角度 (如: 隐藏玩法 / 避坑指南 / 深度评测)",
        "news_query": "功能性搜索词 (如: DeepSeek V3 file upload)",
        "social_query": "情绪性搜索词 (如: DeepSeek 报错 / DeepSeek 不好用)"
    }},
    ...
]"#
    )
}

pub struct Planner {
    llm: Arc<ChatClient>,
}

impl Planner {
    pub fn new(llm: Arc<ChatClient>) -> Self {
        Self { llm }
    }

    /// Plan candidates from the aggregated intelligence digest. Never fails:
    /// unusable model output degrades to the fallback candidate.
    pub async fn plan(
        &self,
        intel_digest: &str,
        history: &[HistoryEntry],
        directed_topic: Option<&str>,
    ) -> Vec<CandidateTopic> {
        let system = plan_prompt(&history_digest(history), directed_topic);
        let user = format!("【混合情报池】\n{intel_digest}");

        match self.llm.complete_json(&system, &user, 0.7).await {
            Ok(reply) => {
                let candidates = candidates_from_value(parser::parse_loose(&reply));
                if candidates.is_empty() {
                    warn!("Planner output unusable — using fallback candidate");
                    vec![fallback_candidate()]
                } else {
                    info!(
                        directions = ?candidates
                            .iter()
                            .map(|c| format!("{}-{}", c.event, c.angle))
                            .collect::<Vec<_>>(),
                        "Plan locked"
                    );
                    candidates
                }
            }
            Err(e) => {
                warn!(error = %e, "Planning call failed — using fallback candidate");
                vec![fallback_candidate()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_array_is_accepted() {
        let value = json!([
            {"event": "DeepSeek", "angle": "隐藏玩法", "news_query": "q", "social_query": "s"}
        ]);
        let candidates = candidates_from_value(value);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].event, "DeepSeek");
    }

    #[test]
    fn events_wrapper_is_unwrapped() {
        let value = json!({"events": [{"event": "Kimi", "angle": "评测"}]});
        let candidates = candidates_from_value(value);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].event, "Kimi");
        // Missing queries default to empty rather than failing the entry.
        assert!(candidates[0].news_query.is_empty());
    }

    #[test]
    fn entries_without_an_event_are_dropped() {
        let value = json!([
            {"event": "", "angle": "x"},
            {"angle": "y"},
            {"event": "AutoGLM", "angle": "实测"}
        ]);
        let candidates = candidates_from_value(value);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].event, "AutoGLM");
    }

    #[test]
    fn non_container_values_yield_nothing() {
        assert!(candidates_from_value(json!("just a string")).is_empty());
        assert!(candidates_from_value(json!({"plan": []})).is_empty());
    }

    #[test]
    fn fallback_candidate_is_actionable() {
        let c = fallback_candidate();
        assert!(!c.event.is_empty());
        assert!(!c.news_query.is_empty());
        assert!(!c.social_query.is_empty());
    }

    #[test]
    fn history_digest_lists_entries_or_says_first_post() {
        assert_eq!(history_digest(&[]), "无（这是第一篇）");

        let digest = history_digest(&[HistoryEntry {
            date: "2026-08-01".to_string(),
            topic: "DeepSeek".to_string(),
            angle: "避坑".to_string(),
        }]);
        assert_eq!(digest, "- 2026-08-01: DeepSeek (避坑)");
    }

    #[test]
    fn directed_topic_reaches_the_prompt() {
        let prompt = plan_prompt("无", Some("Coze"));
        assert!(prompt.contains("【Coze】"));
        assert!(plan_prompt("无", None).contains("心理学三路策略"));
    }
}

//! Run artifacts: the intelligence report and the final-decision document.
//!
//! Both are Markdown files under a dated directory. Downstream drafting
//! reads the decision document as its structured input, so it must exist
//! and be non-empty even on a bad day: the pipeline writes a fallback
//! version rather than nothing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace, strip leftover HTML tags, truncate with an ellipsis.
pub fn clean_text(text: &str, max_chars: usize) -> String {
    let mut out = RE_WS.replace_all(text, " ").trim().to_string();
    out = RE_TAGS.replace_all(&out, "").to_string();
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
        out.push_str("...");
    }
    out
}

/// The structured hand-off to the drafting agent.
#[derive(Debug, Clone)]
pub struct FinalDecision {
    pub title: String,
    /// Psychological-angle tag (锚点效应 / 即时满足 / 损失厌恶 …).
    pub angle: String,
    pub value_line: String,
    pub keywords: Vec<String>,
}

impl FinalDecision {
    pub fn render(&self) -> String {
        let keywords = if self.keywords.is_empty() {
            "- （无）".to_string()
        } else {
            self.keywords
                .iter()
                .map(|k| format!("- {k}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "# 今日主推选题\n\n**标题方向**: {}\n**心理锚点**: {}\n**价值主张**: {}\n\n## 支撑关键词\n\n{}\n",
            self.title, self.angle, self.value_line, keywords
        )
    }
}

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn today_dir(&self) -> PathBuf {
        self.dir.join(Local::now().format("%Y-%m-%d").to_string())
    }

    /// Write the full radar report (raw intelligence + analysis).
    pub fn write_report(&self, mode_info: &str, strategy: &str, raw: &str, analysis: &str) -> Result<PathBuf> {
        let now = Local::now();
        let content = format!(
            "# 🚀 选题雷达报告 ({mode_info})\n\n**时间**: {}\n**策略**: {strategy}\n\n## 深度验证情报\n\n{raw}\n\n---\n\n## 选题分析\n\n{analysis}\n",
            now.format("%Y-%m-%d %H:%M"),
        );

        let path = self
            .today_dir()
            .join(format!("topic_report_{}.md", now.format("%H%M")));
        atomic_write(&path, &content)?;
        info!(path = %path.display(), "Report saved");
        Ok(path)
    }

    /// Write the final-decision document consumed by the drafting agent.
    pub fn write_decision(&self, decision: &FinalDecision) -> Result<PathBuf> {
        let path = self.today_dir().join("final_decision.md");
        atomic_write(&path, &decision.render())?;
        info!(path = %path.display(), topic = %decision.title, "Decision saved");
        Ok(path)
    }
}

fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_markup_and_whitespace() {
        let out = clean_text("  <b>DeepSeek</b>\n\n  新功能   上线 ", 100);
        assert_eq!(out, "DeepSeek 新功能 上线");
    }

    #[test]
    fn clean_text_truncates_with_ellipsis() {
        let out = clean_text(&"字".repeat(50), 10);
        assert_eq!(out.chars().count(), 13);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn decision_renders_all_fields() {
        let decision = FinalDecision {
            title: "DeepSeek 隐藏玩法盘点".to_string(),
            angle: "锚点效应".to_string(),
            value_line: "3 分钟解锁 5 个官方没写的用法".to_string(),
            keywords: vec!["DeepSeek".to_string(), "提示词".to_string()],
        };
        let doc = decision.render();
        assert!(doc.contains("DeepSeek 隐藏玩法盘点"));
        assert!(doc.contains("锚点效应"));
        assert!(doc.contains("- 提示词"));
    }

    #[test]
    fn report_lands_in_a_dated_directory() {
        let dir = std::env::temp_dir().join(format!("trend_radar_reports_{}", std::process::id()));
        let writer = ReportWriter::new(&dir);
        let path = writer
            .write_report("全网雷达", "50/50", "raw intel", "analysis")
            .unwrap();

        assert!(path.exists());
        let today = Local::now().format("%Y-%m-%d").to_string();
        assert!(path.to_string_lossy().contains(&today));
        // No tmp file left behind.
        assert!(!path.with_extension("md.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

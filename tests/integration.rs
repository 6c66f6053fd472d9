//! Integration tests for cross-module functionality: model output flowing
//! through the tolerant parser into candidates, then deduped against a
//! history store.

use chrono::Local;

use trend_radar::dedup::dedup_candidates;
use trend_radar::history::{HistoryEntry, HistoryStore, MemoryHistory};
use trend_radar::parser::parse_loose;
use trend_radar::plan::{candidates_from_value, CandidateTopic};

fn today_entry(topic: &str) -> HistoryEntry {
    HistoryEntry {
        date: Local::now().format("%Y-%m-%d").to_string(),
        topic: topic.to_string(),
        angle: "避坑".to_string(),
    }
}

fn candidate(event: &str) -> CandidateTopic {
    CandidateTopic {
        event: event.to_string(),
        angle: "避坑指南".to_string(),
        news_query: String::new(),
        social_query: String::new(),
    }
}

// ──────────────────────────────────────────
// Parser → planner hand-off
// ──────────────────────────────────────────

#[test]
fn fenced_model_output_becomes_candidates() {
    let raw = "分析如下：\n```json\n[\n  {\"event\": \"DeepSeek\", \"angle\": \"隐藏玩法\", \"news_query\": \"q1\", \"social_query\": \"q2\"},\n  {\"event\": \"AutoGLM\", \"angle\": \"实测\", \"news_query\": \"q3\", \"social_query\": \"q4\"}\n]\n```\n以上。";

    let candidates = candidates_from_value(parse_loose(raw));
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].event, "DeepSeek");
    assert_eq!(candidates[1].angle, "实测");
}

#[test]
fn damaged_wrapper_output_still_yields_candidates() {
    let raw = r#"{events: [{'event': 'Kimi', 'angle': '新功能', 'news_query': 'k', 'social_query': 's'},]}"#;
    let candidates = candidates_from_value(parse_loose(raw));
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].event, "Kimi");
}

#[test]
fn garbage_output_yields_no_candidates() {
    let candidates = candidates_from_value(parse_loose("今天没有值得写的。"));
    assert!(candidates.is_empty());
}

// ──────────────────────────────────────────
// History store → dedup
// ──────────────────────────────────────────

#[test]
fn repeated_history_filters_near_duplicates() {
    let store = MemoryHistory::new();
    for _ in 0..5 {
        store.append(today_entry("DeepSeek 避坑指南")).unwrap();
    }
    let history = store.load_recent(7).unwrap();
    assert_eq!(history.len(), 5);

    let survivors = dedup_candidates(
        vec![
            candidate("DeepSeek 避坑指南"),
            candidate("DeepSeek 避坑指南!"),
            candidate("AI 耳机体验报告"),
        ],
        &history,
        0.82,
    );

    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].event, "AI 耳机体验报告");
}

#[test]
fn saturated_history_still_leaves_one_candidate() {
    let store = MemoryHistory::new();
    store.append(today_entry("Cursor 收费避坑")).unwrap();
    store.append(today_entry("Cursor 太贵了")).unwrap();
    let history = store.load_recent(7).unwrap();

    let survivors = dedup_candidates(
        vec![
            candidate("Cursor 收费避坑"),
            candidate("Cursor 太贵了!"),
            candidate("Cursor 收费避坑!!"),
        ],
        &history,
        0.5,
    );

    assert_eq!(survivors.len(), 1);
}

#[test]
fn stale_history_does_not_suppress_topics() {
    let stale = HistoryEntry {
        date: (Local::now().date_naive() - chrono::Duration::days(20))
            .format("%Y-%m-%d")
            .to_string(),
        topic: "DeepSeek 避坑指南".to_string(),
        angle: "避坑".to_string(),
    };
    let store = MemoryHistory::with_entries(vec![stale]);
    // Outside the 7-day window the old topic is invisible to dedup.
    let history = store.load_recent(7).unwrap();
    assert!(history.is_empty());

    let survivors = dedup_candidates(vec![candidate("DeepSeek 避坑指南")], &history, 0.82);
    assert_eq!(survivors.len(), 1);
}

//! Cross-run topic deduplication.
//!
//! Newly planned candidates are compared against the recent history window
//! by title similarity. Near-duplicates are dropped, but the pipeline must
//! always leave this step with at least one candidate, so when everything
//! looks like last week, the least-similar one survives.

use tracing::{info, warn};

use crate::history::HistoryEntry;
use crate::plan::CandidateTopic;

/// Highest similarity between `title` and any recent history topic.
pub fn max_similarity_to_history(title: &str, history: &[HistoryEntry]) -> f64 {
    if title.is_empty() {
        return 0.0;
    }

    history
        .iter()
        .filter(|h| !h.topic.trim().is_empty())
        .map(|h| strsim::normalized_levenshtein(&title.to_lowercase(), &h.topic.trim().to_lowercase()))
        .fold(0.0, f64::max)
}

/// Drop candidates whose `event` is too close to a recent topic. Guarantees
/// a non-empty result for non-empty input: if every candidate is flagged,
/// the one with the lowest similarity score is force-kept.
pub fn dedup_candidates(
    candidates: Vec<CandidateTopic>,
    history: &[HistoryEntry],
    threshold: f64,
) -> Vec<CandidateTopic> {
    if candidates.is_empty() {
        return candidates;
    }

    let scored: Vec<(CandidateTopic, f64)> = candidates
        .into_iter()
        .map(|c| {
            let score = max_similarity_to_history(c.event.trim(), history);
            (c, score)
        })
        .collect();

    let mut kept: Vec<CandidateTopic> = Vec::new();
    for (candidate, score) in &scored {
        if *score < threshold {
            kept.push(candidate.clone());
        } else {
            info!(
                event = %candidate.event,
                similarity = format!("{score:.2}"),
                "Dropping near-duplicate of recent history"
            );
        }
    }

    if kept.is_empty() {
        // Anti-starvation: surface the least-bad option instead of nothing.
        let (fallback, score) = scored
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("non-empty scored list");
        warn!(
            event = %fallback.event,
            similarity = format!("{score:.2}"),
            "All topics flagged as duplicates — force-keeping the least similar one"
        );
        kept.push(fallback.clone());
    }

    kept
}

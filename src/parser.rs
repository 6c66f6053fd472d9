//! Tolerant parsing for model-emitted JSON.
//!
//! Planner and extractor output arrives as free text that *usually* contains
//! JSON: sometimes clean, sometimes fenced in markdown, sometimes with the
//! kind of damage chat models inflict (trailing commas, unquoted keys,
//! truncated tails). `parse_loose` recovers what it can and
//! returns an empty array for anything unusable; callers treat that as
//! "planning produced nothing" and fall back, never as a crash.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Parse stages, first success wins: strict parse, fenced block, first
/// balanced `{...}`/`[...]` span (repaired if needed), whole-text repair.
pub fn parse_loose(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Array(vec![]);
    }

    if let Ok(v) = serde_json::from_str(trimmed) {
        return v;
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(v) = serde_json::from_str(inner.trim()) {
            return v;
        }
        if let Some(v) = repair_and_parse(inner) {
            debug!("Recovered JSON from fenced block after repair");
            return v;
        }
    }

    if let Some(span) = balanced_span(trimmed) {
        if let Ok(v) = serde_json::from_str(span) {
            return v;
        }
        if let Some(v) = repair_and_parse(span) {
            debug!("Recovered JSON span after repair");
            return v;
        }
    }

    if let Some(v) = repair_and_parse(trimmed) {
        debug!("Recovered JSON after whole-text repair");
        return v;
    }

    warn!(len = raw.len(), "Model output unusable as JSON");
    Value::Array(vec![])
}

/// Contents of the first ``` fence, skipping an optional language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_marker = &text[start + 3..];
    // Language tag (e.g. "json") runs to the end of the marker line.
    let body_start = after_marker.find('\n').map(|n| n + 1).unwrap_or(0);
    let body = &after_marker[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// First balanced `{...}` or `[...]` span, tracking nesting of both bracket
/// kinds and skipping braces inside string literals. A span left open at end
/// of input (truncated output) is returned as-is so the repair pass can
/// close it.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Some(&text[start..])
}

static RE_UNQUOTED_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([{\[,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)(\s*:)"#).unwrap());
static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

fn repair_and_parse(text: &str) -> Option<Value> {
    let repaired = repair(text);
    serde_json::from_str(&repaired).ok()
}

/// Best-effort normalization of almost-JSON into JSON.
fn repair(text: &str) -> String {
    let mut out = normalize_quotes(text.trim());
    out = RE_UNQUOTED_KEY.replace_all(&out, "$1\"$2\"$3").into_owned();
    out = RE_TRAILING_COMMA.replace_all(&out, "$1").into_owned();
    close_open_delimiters(&out)
}

/// Rewrite single-quoted string literals as double-quoted ones.
fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_double || in_single => {
                escape_next = true;
                out.push(ch);
            }
            '"' if in_single => out.push_str("\\\""),
            '"' => {
                in_double = !in_double;
                out.push('"');
            }
            '\'' if !in_double => {
                in_single = !in_single;
                out.push('"');
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Append whatever closers a truncated payload is missing.
fn close_open_delimiters(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    if !in_string && stack.is_empty() {
        return text.to_string();
    }

    let mut out = text.trim_end().trim_end_matches(',').to_string();
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

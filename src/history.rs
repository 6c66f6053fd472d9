//! Rolling history of selected topics.
//!
//! The only state shared across runs. Read once at run start (the recent
//! window feeds dedup), appended once at run end. The store is an injected
//! trait so tests swap in the in-memory fake.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// YYYY-MM-DD
    pub date: String,
    pub topic: String,
    pub angle: String,
}

impl HistoryEntry {
    pub fn today(topic: impl Into<String>, angle: impl Into<String>) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d").to_string(),
            topic: topic.into(),
            angle: angle.into(),
        }
    }
}

pub trait HistoryStore: Send + Sync {
    /// Entries dated within the trailing `window_days` of today.
    fn load_recent(&self, window_days: i64) -> Result<Vec<HistoryEntry>>;

    /// Append one entry, keeping only the most recent entries overall.
    fn append(&self, entry: HistoryEntry) -> Result<()>;
}

fn within_window(entries: Vec<HistoryEntry>, window_days: i64) -> Vec<HistoryEntry> {
    let today = Local::now().date_naive();
    entries
        .into_iter()
        .filter(|e| match NaiveDate::parse_from_str(&e.date, "%Y-%m-%d") {
            Ok(date) => (today - date).num_days() <= window_days,
            Err(_) => false,
        })
        .collect()
}

/// Whole-array JSON file, written atomically (tmp + rename).
pub struct JsonFileHistory {
    path: PathBuf,
    cap: usize,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
        }
    }

    /// A missing or corrupt file reads as empty history.
    fn read_all(&self) -> Vec<HistoryEntry> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "History file unreadable — starting fresh");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }
}

impl HistoryStore for JsonFileHistory {
    fn load_recent(&self, window_days: i64) -> Result<Vec<HistoryEntry>> {
        let recent = within_window(self.read_all(), window_days);
        debug!(count = recent.len(), window_days, "Recent history loaded");
        Ok(recent)
    }

    fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut all = self.read_all();
        all.push(entry);
        if all.len() > self.cap {
            let excess = all.len() - self.cap;
            all.drain(0..excess);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&all)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

/// In-memory store for tests.
pub struct MemoryHistory {
    inner: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    pub fn with_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            inner: Mutex::new(entries),
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.inner.lock().expect("history mutex poisoned").clone()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for MemoryHistory {
    fn load_recent(&self, window_days: i64) -> Result<Vec<HistoryEntry>> {
        let all = self.inner.lock().expect("history mutex poisoned").clone();
        Ok(within_window(all, window_days))
    }

    fn append(&self, entry: HistoryEntry) -> Result<()> {
        self.inner.lock().expect("history mutex poisoned").push(entry);
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::Result;
use chrono::{DateTime, Local};

use crate::config::Config;

/// Only this many analyses are kept; older ones fall off the end.
pub const HISTORY_CAPACITY: usize = 5;

/// One completed analysis, as persisted. The timestamp is formatted at save
/// time and stored as text, never recomputed on render.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecentAnalysis {
    pub prompt: String,
    pub result: String,
    pub image_source: String,
    pub timestamp: String,
}

impl RecentAnalysis {
    /// List-row text: timestamp plus a short prompt preview.
    pub fn row_label(&self) -> String {
        let preview: String = self.prompt.chars().take(30).collect();
        format!("{}: {}...", self.timestamp, preview)
    }
}

/// Most-recent-first list of completed analyses, backed by a JSON file in
/// the app config directory.
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<RecentAnalysis>,
}

impl HistoryStore {
    pub fn open_default() -> Result<Self> {
        Self::open(Config::data_dir()?.join("recent_analyses.json"))
    }

    /// Open a store at an explicit path, loading whatever is already there.
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self { path, entries })
    }

    pub fn entries(&self) -> &[RecentAnalysis] {
        &self.entries
    }

    /// Prepend a record, evict past capacity, and write the file back.
    pub fn save(&mut self, record: RecentAnalysis) -> Result<()> {
        self.entries.insert(0, record);
        self.entries.truncate(HISTORY_CAPACITY);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// `YYYY-MM-DD HH:MM`, the format records carry for display.
pub fn format_timestamp(when: DateTime<Local>) -> String {
    when.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(n: usize) -> RecentAnalysis {
        RecentAnalysis {
            prompt: format!("prompt {}", n),
            result: format!("answer {}", n),
            image_source: "URL: https://example.com/cat.jpg".to_string(),
            timestamp: "2026-08-06 10:00".to_string(),
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_analyses.json");
        let mut store = HistoryStore::open(path.clone()).unwrap();

        for n in 0..6 {
            store.save(record(n)).unwrap();
        }

        assert_eq!(store.entries().len(), HISTORY_CAPACITY);
        // Most recent first, oldest (0) evicted
        assert_eq!(store.entries()[0].prompt, "prompt 5");
        assert_eq!(store.entries()[4].prompt, "prompt 1");

        // Survives a reload from disk
        let reloaded = HistoryStore::open(path).unwrap();
        assert_eq!(reloaded.entries().len(), HISTORY_CAPACITY);
        assert_eq!(reloaded.entries()[0].prompt, "prompt 5");
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("nothing.json")).unwrap();
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_open_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_analyses.json");
        fs::write(&path, "not json at all").unwrap();
        let store = HistoryStore::open(path).unwrap();
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_row_label_truncates_prompt() {
        let analysis = RecentAnalysis {
            prompt: "describe everything you can see in this photograph".to_string(),
            result: String::new(),
            image_source: String::new(),
            timestamp: "2026-08-06 10:00".to_string(),
        };
        assert_eq!(
            analysis.row_label(),
            "2026-08-06 10:00: describe everything you can se..."
        );
    }

    #[test]
    fn test_format_timestamp() {
        let when = Local.with_ymd_and_hms(2026, 8, 6, 9, 5, 0).unwrap();
        assert_eq!(format_timestamp(when), "2026-08-06 09:05");
    }
}

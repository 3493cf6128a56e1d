//! Question history log

use serde::{Deserialize, Serialize};

/// Maximum number of entries kept in the history log
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local time the answer was produced, human readable
    pub timestamp: String,
    pub question: String,
    pub answer: String,
}

impl HistoryEntry {
    /// Create an entry stamped with the current local time
    #[must_use]
    pub fn now(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Bounded history, most recent entry first
///
/// Eviction is by insertion order; timestamps are never parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Create an empty log
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a log from stored entries (most recent first), dropping overflow
    #[must_use]
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        entries.truncate(MAX_HISTORY_ENTRIES);
        Self { entries }
    }

    /// Insert an entry at the front, evicting the oldest on overflow
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, most recent first
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            timestamp: "2024-01-01 00:00:00".to_string(),
            question: format!("question {n}"),
            answer: format!("answer {n}"),
        }
    }

    #[test]
    fn test_push_is_most_recent_first() {
        let mut log = HistoryLog::new();
        log.push(entry(1));
        log.push(entry(2));

        assert_eq!(log.entries()[0].question, "question 2");
        assert_eq!(log.entries()[1].question, "question 1");
    }

    #[test]
    fn test_fifty_first_entry_evicts_oldest() {
        let mut log = HistoryLog::new();
        for n in 1..=MAX_HISTORY_ENTRIES {
            log.push(entry(n));
        }
        assert_eq!(log.len(), MAX_HISTORY_ENTRIES);

        log.push(entry(51));
        assert_eq!(log.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(log.entries()[0].question, "question 51");
        assert!(log.entries().iter().all(|e| e.question != "question 1"));
        assert_eq!(log.entries()[MAX_HISTORY_ENTRIES - 1].question, "question 2");
    }

    #[test]
    fn test_eviction_ignores_timestamps() {
        let mut log = HistoryLog::new();
        let mut old = entry(0);
        old.timestamp = "2999-12-31 23:59:59".to_string();
        log.push(old);
        for n in 1..=MAX_HISTORY_ENTRIES {
            log.push(entry(n));
        }

        assert!(log.entries().iter().all(|e| e.question != "question 0"));
    }

    #[test]
    fn test_from_entries_truncates() {
        let entries: Vec<_> = (0..80).map(entry).collect();
        let log = HistoryLog::from_entries(entries);
        assert_eq!(log.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(log.entries()[0].question, "question 0");
    }

    #[test]
    fn test_entry_serializes_with_plain_keys() {
        let json = serde_json::to_value(entry(1)).unwrap();
        assert_eq!(json["question"], "question 1");
        assert_eq!(json["answer"], "answer 1");
        assert!(json["timestamp"].is_string());
    }
}

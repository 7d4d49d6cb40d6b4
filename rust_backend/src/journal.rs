//! Run journal: an ordered, timestamped record of what a run did.
//!
//! Every fallback decision (source rejected, window advanced, quality tolerance
//! relaxed, synthetic substitution) is recorded here and also emitted through the
//! `log` facade, so the same events show up in the console and in the serialized run.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub level: JournalLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Shared, append-only journal. Cloning shares the underlying entries.
#[derive(Clone, Default)]
pub struct RunJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl RunJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and forward it to the logger.
    pub fn record(
        &self,
        level: JournalLevel,
        dataset: Option<&str>,
        message: impl Into<String>,
        detail: serde_json::Value,
    ) {
        let message = message.into();
        let prefix = dataset.map(|d| format!("[{}] ", d)).unwrap_or_default();
        match level {
            JournalLevel::Info | JournalLevel::Success => log::info!("{}{}", prefix, message),
            JournalLevel::Warning => log::warn!("{}{}", prefix, message),
            JournalLevel::Error => log::error!("{}{}", prefix, message),
        }
        self.entries.write().push(JournalEntry {
            timestamp: Utc::now(),
            level,
            dataset: dataset.map(str::to_string),
            message,
            detail,
        });
    }

    pub fn info(&self, dataset: Option<&str>, message: impl Into<String>) {
        self.record(JournalLevel::Info, dataset, message, serde_json::Value::Null);
    }

    pub fn success(&self, dataset: Option<&str>, message: impl Into<String>) {
        self.record(JournalLevel::Success, dataset, message, serde_json::Value::Null);
    }

    pub fn warning(&self, dataset: Option<&str>, message: impl Into<String>) {
        self.record(JournalLevel::Warning, dataset, message, serde_json::Value::Null);
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().clone()
    }

    /// Entries recorded for one dataset.
    pub fn for_dataset(&self, dataset: &str) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.dataset.as_deref() == Some(dataset))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for RunJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunJournal").field("entries", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_entries() {
        let journal = RunJournal::new();
        let other = journal.clone();
        journal.info(Some("ndvi"), "fetching");
        other.warning(Some("no2"), "tolerance relaxed");
        other.record(
            JournalLevel::Error,
            None,
            "source failed",
            json!({ "source": "token" }),
        );

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.for_dataset("no2").len(), 1);
        let entries = journal.entries();
        assert_eq!(entries[0].message, "fetching");
        assert_eq!(entries[2].detail["source"], "token");
    }

    #[test]
    fn test_serializes_without_empty_fields() {
        let journal = RunJournal::new();
        journal.success(None, "done");
        let value = serde_json::to_value(journal.entries()).unwrap();
        assert_eq!(value[0]["level"], "success");
        assert!(value[0].get("dataset").is_none());
        assert!(value[0].get("detail").is_none());
    }
}

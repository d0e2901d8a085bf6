//! Bounded activity log shared across the extension contexts.
//!
//! Every router operation appends a [`LogEntry`] here; the popup renders the
//! book newest-first. The book is a bounded ring so long sessions cannot grow
//! state without limit.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Current Unix epoch time in milliseconds.
#[must_use]
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Severity assigned to a log entry, derived from its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug = 0,
    /// Normal operation
    Info = 1,
    /// Security-relevant activity
    Warn = 2,
    /// Failed operation
    Error = 3,
    /// Threshold value that records nothing; never assigned to an entry
    None = 4,
}

impl LogLevel {
    /// Default level for entries in the given category.
    ///
    /// Security events and attack reports are warnings; demonstration
    /// failures are errors; everything else is routine.
    #[must_use]
    pub fn for_entry(category: &str, action: &str) -> Self {
        match category {
            "security" => Self::Warn,
            "training" if action == "demonstrationFailed" => Self::Error,
            _ => Self::Info,
        }
    }
}

/// A single recorded event.
///
/// Serializes with the exact field set the popup and persisted snapshots
/// expect: `timestamp`, `category`, `action`, `details`, `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the event happened (Unix epoch millis)
    pub timestamp: u64,
    /// Event category (`scan`, `detection`, `protection`, `training`, `security`, `system`)
    pub category: String,
    /// Event action within the category
    pub action: String,
    /// Structured payload
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    /// Page the event concerns, or `"unknown"`
    pub url: String,
}

impl LogEntry {
    /// Creates an entry timestamped now. The `url` field is lifted out of
    /// `details` when present, `"unknown"` otherwise.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let url = details
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Self {
            timestamp: now_millis(),
            category: category.into(),
            action: action.into(),
            details,
            url,
        }
    }

    /// Creates an entry with a specific timestamp (for testing)
    #[must_use]
    pub fn with_timestamp(
        timestamp: u64,
        category: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let mut entry = Self::new(category, action, details);
        entry.timestamp = timestamp;
        entry
    }

    /// Level derived from the entry's category and action.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::for_entry(&self.category, &self.action)
    }

    /// Returns a formatted display string: `[HH:MM:SS] [CATEGORY] action`
    /// plus any detail fields worth surfacing.
    #[must_use]
    pub fn format_line(&self) -> String {
        let clock = chrono::DateTime::from_timestamp_millis(self.timestamp as i64)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let mut line = format!(
            "[{clock}] [{}] {}",
            self.category.to_uppercase(),
            self.action
        );
        for key in [
            "url",
            "vulnerabilitiesFound",
            "version",
            "attackType",
            "error",
        ] {
            if let Some(value) = self.details.get(key) {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                line.push_str(&format!(" {key}={rendered}"));
            }
        }
        line
    }
}

/// Bounded event log, newest entry first.
///
/// Mirrors the eviction discipline of the background state store: new
/// entries are prepended and the oldest entry is dropped once the book
/// exceeds its capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<LogEntry>", into = "Vec<LogEntry>")]
pub struct LogBook {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    min_level: LogLevel,
}

impl Default for LogBook {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for LogBook {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl LogBook {
    /// Default maximum number of retained entries
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Creates an empty book with default capacity, recording all levels
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates an empty book with a custom capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the minimum level below which entries are discarded on record
    #[must_use]
    pub fn with_min_level(mut self, min_level: LogLevel) -> Self {
        self.min_level = min_level;
        self
    }

    /// Records an entry, evicting the oldest if the book is full.
    ///
    /// Entries below the minimum level are dropped. Each recorded entry is
    /// also echoed to the `tracing` subscriber at its level.
    pub fn record(&mut self, entry: LogEntry) {
        let level = entry.level();
        if level < self.min_level || self.min_level == LogLevel::None {
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!(
                category = %entry.category,
                action = %entry.action,
                url = %entry.url,
                "logbook entry"
            ),
            LogLevel::Info => tracing::info!(
                category = %entry.category,
                action = %entry.action,
                url = %entry.url,
                "logbook entry"
            ),
            LogLevel::Warn => tracing::warn!(
                category = %entry.category,
                action = %entry.action,
                url = %entry.url,
                "logbook entry"
            ),
            LogLevel::Error | LogLevel::None => tracing::error!(
                category = %entry.category,
                action = %entry.action,
                url = %entry.url,
                "logbook entry"
            ),
        }
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Returns the number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates newest first (wire order)
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Iterates oldest first
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().rev()
    }

    /// Returns the most recent entry
    #[must_use]
    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Returns the oldest retained entry
    #[must_use]
    pub fn oldest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Entries in the given category, newest first
    pub fn entries_for_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a LogEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Entries at or above the given level, newest first
    pub fn entries_at_or_above(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.level() >= level)
    }
}

impl From<Vec<LogEntry>> for LogBook {
    fn from(entries: Vec<LogEntry>) -> Self {
        let mut book = Self::new();
        book.entries = entries.into_iter().take(book.capacity).collect();
        book
    }
}

impl From<LogBook> for Vec<LogEntry> {
    fn from(book: LogBook) -> Self {
        book.entries.into_iter().collect()
    }
}

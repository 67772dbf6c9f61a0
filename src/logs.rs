//! User-visible log
//!
//! An append-only transcript of what the client did, in insertion order.
//! Every entry is also mirrored to `tracing`.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A single log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Local wall-clock time (HH:MM:SS)
    pub timestamp: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.timestamp, self.message)
    }
}

/// Line written by [`LogSink::write_jsonl`]
#[derive(Serialize)]
struct TranscriptLine<'a> {
    exported_at: DateTime<Utc>,
    index: usize,
    #[serde(flatten)]
    entry: &'a LogEntry,
}

/// Shared handle to the session log
///
/// Cloning is cheap; all clones append to the same sequence.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message stamped with the current local time
    pub fn append(&self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        };
        tracing::info!(target: "og_inference_client::log", "{}", entry.message);
        self.lock().push(entry);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of all entries in insertion order
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Messages only, without timestamps
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append the current transcript to a JSONL file
    pub fn write_jsonl(&self, path: &Path) -> std::io::Result<()> {
        let entries = self.snapshot();
        let exported_at = Utc::now();

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for (index, entry) in entries.iter().enumerate() {
            let line = TranscriptLine {
                exported_at,
                index,
                entry,
            };
            let json = serde_json::to_string(&line)?;
            writeln!(file, "{}", json)?;
        }
        Ok(())
    }
}

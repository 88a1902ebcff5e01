// Append-only sink for per-item failure events

use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Where failure events go. Successes are never recorded.
pub trait FailureLog: Send + Sync {
    fn record(&self, message: &str);
}

pub type SharedFailureLog = Arc<dyn FailureLog>;

/// `<timestamp> -- <message>`
pub fn format_line(timestamp: DateTime<Local>, message: &str) -> String {
    format!("{} -- {}\n", timestamp.format("%Y-%m-%d_%H:%M:%S"), message)
}

/// Appends one line per event to a file shared by every worker.
#[derive(Debug)]
pub struct FileFailureLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileFailureLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FailureLog for FileFailureLog {
    fn record(&self, message: &str) {
        let line = format_line(Local::now(), message);
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!("Failed to write to {}: {}", self.path.display(), e);
        }
    }
}

/// Keeps events in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryFailureLog {
    messages: Mutex<Vec<String>>,
}

impl MemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl FailureLog for MemoryFailureLog {
    fn record(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullFailureLog;

impl FailureLog for NullFailureLog {
    fn record(&self, _message: &str) {}
}

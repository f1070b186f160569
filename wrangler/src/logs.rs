//! Pipeline log sink.
//!
//! Every stage reports what it did (rows read, duplicates removed, labels
//! backfilled...) through the functions below. Entries go to stderr, so
//! stdout stays free for data output, and the most recent ones are kept in
//! memory for callers that want to show or assert on them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Number of entries retained by the sink.
const HISTORY_CAPACITY: usize = 100;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting level (for per-column or per-view details)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log sink
pub static LOG_SINK: Lazy<LogSink> = Lazy::new(LogSink::new);

/// Prints log entries and keeps a bounded history of them.
pub struct LogSink {
    history: Mutex<VecDeque<LogEntry>>,
    quiet: AtomicBool,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            quiet: AtomicBool::new(false),
        }
    }

    /// Record an entry, printing it unless the sink is quiet.
    pub fn log(&self, entry: LogEntry) {
        if !self.quiet.load(Ordering::Relaxed) {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
                LogLevel::Error => "   ❌",
            };
            let indent = "   ".repeat(entry.indent as usize);
            eprintln!("{}{} {}", indent, prefix, entry.message);
        }

        // Poisoned only if a logging thread panicked
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(entry);
    }

    /// Stop (or resume) printing entries. History is kept either way.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn recent(&self) -> Vec<LogEntry> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().cloned().collect()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_SINK.log(LogEntry::info(msg).with_indent(indent));
}

pub fn log_success_indent(msg: impl Into<String>, indent: u8) {
    LOG_SINK.log(LogEntry::success(msg).with_indent(indent));
}

pub fn set_quiet(quiet: bool) {
    LOG_SINK.set_quiet(quiet);
}

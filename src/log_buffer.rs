//! Operator log buffer
//!
//! Bounded, thread-safe sink for the messages shown to operators (web `/logs`
//! endpoint, console). Every entry is mirrored to `tracing` as well.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{error, info, warn};

/// Maximum number of entries retained
pub const LOG_CAPACITY: usize = 1000;

/// Severity of an operator log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A single timestamped message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// `[HH:MM:SS] message`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// FIFO log buffer; the oldest entry is evicted once capacity is reached
#[derive(Debug)]
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(LOG_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Append a message, mirroring it to `tracing` at the same level
    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };

        match level {
            LogLevel::Info => info!("{}", entry.message),
            LogLevel::Warn => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }

        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Rendered lines in arrival order
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(LogEntry::render).collect()
    }

    /// Copy of all retained entries in arrival order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_render_format() {
        let log = LogBuffer::new();
        log.info(" [*][main] started");

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        // "[HH:MM:SS]  [*][main] started"
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][9..], "]  [*][main] started");
    }

    #[test]
    fn test_evicts_oldest_first() {
        let log = LogBuffer::new();
        for i in 0..1005 {
            log.info(format!("msg {}", i));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), LOG_CAPACITY);
        assert_eq!(entries.first().unwrap().message, "msg 5");
        assert_eq!(entries.last().unwrap().message, "msg 1004");
    }

    #[test]
    fn test_levels_are_kept() {
        let log = LogBuffer::with_capacity(10);
        log.info("a");
        log.warn("b");
        log.error("c");

        let levels: Vec<_> = log.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Warn, LogLevel::Error]);
    }

    #[test]
    fn test_concurrent_writers() {
        let log = Arc::new(LogBuffer::with_capacity(500));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        log.info(format!("t{} {}", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(log.len(), 500);
        // Per-thread order survives interleaving
        let t0: Vec<usize> = log
            .entries()
            .iter()
            .filter_map(|e| e.message.strip_prefix("t0 ").map(|n| n.parse().unwrap()))
            .collect();
        assert!(t0.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #[test]
        fn keeps_most_recent_entries(n in 0usize..2500) {
            let log = LogBuffer::new();
            for i in 0..n {
                log.info(i.to_string());
            }

            let entries = log.entries();
            prop_assert_eq!(entries.len(), n.min(LOG_CAPACITY));
            let first = n.saturating_sub(LOG_CAPACITY);
            for (offset, entry) in entries.iter().enumerate() {
                prop_assert_eq!(entry.message.clone(), (first + offset).to_string());
            }
        }
    }
}

//! Bounded in-memory server log.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::Local;

/// Upper bound on retained log text, in characters.
pub const MAX_LOG_CHARS: usize = 50_000;

/// Timestamped log lines, oldest dropped first once the bound is exceeded.
#[derive(Debug)]
pub struct Journal {
    inner: Mutex<JournalInner>,
    max_chars: usize,
}

#[derive(Debug, Default)]
struct JournalInner {
    lines: VecDeque<String>,
    chars: usize,
}

impl Journal {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_CHARS)
    }

    /// Creates a journal bounded at `max_chars` characters.
    pub fn with_capacity(max_chars: usize) -> Self {
        Self {
            inner: Mutex::new(JournalInner::default()),
            max_chars,
        }
    }

    /// Appends a message stamped with local time.
    pub fn record(&self, message: &str) {
        let stamp = Local::now().format("%Y/%m/%d %H:%M:%S");
        let line = format!("[{stamp}] {message}");
        let len = line.chars().count() + 1;

        let mut inner = self.lock();
        inner.lines.push_back(line);
        inner.chars += len;

        // Always keep the newest line, even if it alone exceeds the bound.
        while inner.chars > self.max_chars && inner.lines.len() > 1 {
            if let Some(dropped) = inner.lines.pop_front() {
                inner.chars -= dropped.chars().count() + 1;
            }
        }
    }

    /// Returns the log text, one entry per line.
    pub fn contents(&self) -> String {
        let inner = self.lock();
        let mut out = String::with_capacity(inner.chars);
        for line in &inner.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.lines.clear();
        inner.chars = 0;
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, JournalInner> {
        // A panic while holding the lock cannot leave the deque half-updated
        // in a way that matters for a log, so recover the guard.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_timestamped() {
        let journal = Journal::new();
        journal.record("hello");
        let text = journal.contents();
        assert!(text.starts_with('['));
        assert!(text.trim_end().ends_with("] hello"));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_clear() {
        let journal = Journal::new();
        journal.record("a");
        journal.record("b");
        journal.clear();
        assert!(journal.is_empty());
        assert_eq!(journal.contents(), "");
    }

    #[test]
    fn test_oldest_lines_dropped_over_bound() {
        // Each line is "[YYYY/MM/DD HH:MM:SS] nn" plus newline: 25 chars
        let journal = Journal::with_capacity(60);
        for i in 10..15 {
            journal.record(&i.to_string());
        }
        let text = journal.contents();
        assert_eq!(journal.len(), 2);
        assert!(text.contains("] 13"));
        assert!(text.contains("] 14"));
        assert!(!text.contains("] 12"));
        assert!(text.chars().count() <= 60);
    }

    #[test]
    fn test_single_oversized_line_kept() {
        let journal = Journal::with_capacity(10);
        journal.record(&"x".repeat(50));
        assert_eq!(journal.len(), 1);
    }
}

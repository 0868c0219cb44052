//! Extraction counters passed explicitly into the engine
//!
//! Callers that want instrumentation create one `ExtractionCounters`, share it
//! through an `Arc` and read a [`CounterSnapshot`] afterwards.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ExtractionCounters {
    commits: AtomicUsize,
    file_changes: AtomicUsize,
    diff_entries: AtomicUsize,
    processes: AtomicUsize,
}

/// Point-in-time copy of [`ExtractionCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub commits: usize,
    pub file_changes: usize,
    pub diff_entries: usize,
    pub processes: usize,
}

impl ExtractionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_commit(&self, file_changes: usize) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.file_changes.fetch_add(file_changes, Ordering::Relaxed);
    }

    pub fn record_diff_entries(&self, count: usize) {
        self.diff_entries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_process(&self) {
        self.processes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            file_changes: self.file_changes.load(Ordering::Relaxed),
            diff_entries: self.diff_entries.load(Ordering::Relaxed),
            processes: self.processes.load(Ordering::Relaxed),
        }
    }
}

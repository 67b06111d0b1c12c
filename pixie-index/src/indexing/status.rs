//! Progress tracking for indexing runs.
//!
//! [`StatusTracker`] owns the mutable run state behind a mutex and only ever
//! hands out copies, so callers on other tasks can poll progress while a run
//! is writing to it. `try_begin` doubles as the mutual-exclusion gate: it
//! atomically checks that no run is active and claims the slot.

use chrono::Utc;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Instant;

/// Snapshot of indexing progress, safe to serialize and hand to callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexingStatus {
    pub is_indexing: bool,
    pub progress: usize,
    pub total: usize,
    pub message: String,
    /// Unix timestamp of when the current (or last) run began
    pub start_time: Option<i64>,
    pub estimated_time: String,
}

impl Default for IndexingStatus {
    fn default() -> Self {
        Self {
            is_indexing: false,
            progress: 0,
            total: 0,
            message: String::new(),
            start_time: None,
            estimated_time: String::new(),
        }
    }
}

struct TrackerInner {
    status: IndexingStatus,
    // Monotonic clock for ETA math; start_time above is wall-clock for display
    started: Option<Instant>,
}

/// Shared progress record for the single indexing slot.
pub struct StatusTracker {
    inner: Mutex<TrackerInner>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                status: IndexingStatus::default(),
                started: None,
            }),
        }
    }

    /// Claim the indexing slot. Returns false if a run is already active;
    /// on success the status is reset for the new run.
    pub fn try_begin(&self, total_hint: usize) -> bool {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        if inner.status.is_indexing {
            return false;
        }
        inner.status = IndexingStatus {
            is_indexing: true,
            progress: 0,
            total: total_hint,
            message: "Starting indexing...".to_string(),
            start_time: Some(Utc::now().timestamp()),
            estimated_time: "Calculating...".to_string(),
        };
        inner.started = Some(Instant::now());
        true
    }

    /// Record progress and recompute the ETA from the observed rate.
    pub fn update(&self, progress: usize, total: usize, message: impl Into<String>) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.status.progress = progress;
        inner.status.total = total;
        inner.status.message = message.into();
        inner.status.estimated_time = match inner.started {
            Some(started) if progress > 0 && total > progress => {
                let elapsed = started.elapsed().as_secs_f64();
                let rate = progress as f64 / elapsed.max(f64::EPSILON);
                let remaining = (total - progress) as f64 / rate;
                format_eta(remaining)
            }
            Some(_) if progress > 0 => String::new(),
            _ => "Calculating...".to_string(),
        };
    }

    /// Release the indexing slot, keeping the final progress/total as the
    /// record of the completed run.
    pub fn finish(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.status.is_indexing = false;
        inner.status.message = message.into();
        inner.status.estimated_time = String::new();
        inner.started = None;
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> IndexingStatus {
        self.inner.lock().expect("status lock poisoned").status.clone()
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn format_eta(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}m {}s remaining", total / 60, total % 60)
}

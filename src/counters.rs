//! Run-wide progress counters
//!
//! `RunCounters` is shared through an `Arc` between the worker doing the
//! collection or verification and the orchestrator sampling progress. All
//! counters are monotonic atomics updated with relaxed ordering: readers may
//! see a slightly stale or mutually inconsistent set of values, which is fine
//! for progress display and never used for a comparison decision.

use crate::types::{AlertCounts, Phase, ProgressInfo, Severity};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between workers and the progress reporter
#[derive(Debug, Default)]
pub struct RunCounters {
    files_processed: AtomicU64,
    total_files: AtomicU64,
    total_bytes: AtomicU64,
    notices: AtomicU64,
    warnings: AtomicU64,
    criticals: AtomicU64,
    current_file: Mutex<Option<PathBuf>>,
}

impl RunCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one inventoried file of `bytes` bytes
    pub fn record_file(&self, bytes: u64) {
        self.total_files.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Mark `path` as the file being verified
    pub fn set_current(&self, path: &Path) {
        *self.current_file.lock() = Some(path.to_path_buf());
    }

    /// Count one verified file
    pub fn record_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one drained alert
    pub fn record_alert(&self, severity: Severity) {
        let counter = match severity {
            Severity::Notice => &self.notices,
            Severity::Warning => &self.warnings,
            Severity::Critical => &self.criticals,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Files verified so far
    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::Relaxed)
    }

    /// Files inventoried so far
    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::Relaxed)
    }

    /// Bytes inventoried so far
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Alerts drained so far, per severity
    pub fn alert_counts(&self) -> AlertCounts {
        AlertCounts {
            notice: self.notices.load(Ordering::Relaxed),
            warning: self.warnings.load(Ordering::Relaxed),
            critical: self.criticals.load(Ordering::Relaxed),
        }
    }

    /// Alerts drained so far
    pub fn total_alerts(&self) -> u64 {
        self.alert_counts().total()
    }

    /// Sample the counters for a progress tick
    pub fn snapshot(&self, phase: Phase) -> ProgressInfo {
        let current_item = match phase {
            Phase::Collecting => None,
            Phase::Verifying => self
                .current_file
                .lock()
                .as_ref()
                .map(|p| p.display().to_string()),
        };

        ProgressInfo {
            phase,
            current_item,
            processed: match phase {
                Phase::Collecting => self.total_files(),
                Phase::Verifying => self.files_processed(),
            },
            total: match phase {
                Phase::Collecting => None,
                Phase::Verifying => Some(self.total_files()),
            },
            total_bytes: self.total_bytes(),
            total_alerts: self.total_alerts(),
        }
    }
}

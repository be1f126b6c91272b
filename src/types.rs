//! Core data types used throughout the mirrorguard library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Findings**: `Severity`, `Alert` - what the checker reports about a file
//! - **Configuration**: `CheckMode`, `CheckConfig` - how a run compares trees
//! - **Progress**: `Phase`, `ProgressInfo` - snapshots handed to reporters
//! - **Results**: `AlertCounts`, `RunSummary` - the outcome of a finished run
//!
//! ## Examples
//!
//! ```rust
//! use mirrorguard::types::{Alert, Severity};
//!
//! let alert = Alert::critical("docs/report.pdf", "is missing from backup");
//! assert_eq!(alert.severity, Severity::Critical);
//! assert_eq!(alert.to_string(), "[CRITICAL] docs/report.pdf: is missing from backup");
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default allowed lag between a live file and its backup copy (24 hours)
pub const DEFAULT_MTIME_TOLERANCE_SECS: u64 = 86_400;

/// Default interval between two progress samples
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// How serious an alert is
///
/// Ordered from least to most severe so alerts can be filtered with a
/// simple comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, e.g. a directory skipped by an exclusion rule
    Notice,
    /// Expected staleness or a recovered I/O problem worth a look
    Warning,
    /// A hard absence or a corruption signal
    Critical,
}

impl Severity {
    /// Upper-case label used in rendered output
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single finding about one live path
///
/// Alerts are immutable once created. The subject path is always a path
/// relative to the live root that was seen during inventory collection
/// (a file, or for notices an excluded directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// How serious the finding is
    pub severity: Severity,
    /// Live-relative path the alert is about
    pub path: PathBuf,
    /// Human readable explanation
    pub message: String,
}

impl Alert {
    /// Create an alert with an explicit severity
    pub fn new(severity: Severity, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a notice
    pub fn notice(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(Severity::Notice, path, message)
    }

    /// Create a warning
    pub fn warning(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, path, message)
    }

    /// Create a critical alert
    pub fn critical(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, path, message)
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path.display(), self.message)
    }
}

/// Comparison policy applied to every inventoried file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Hash both copies and report content drift behind identical mtimes
    Hash,
    /// Compare existence, mtime and size only
    #[default]
    Metadata,
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMode::Hash => f.write_str("hash"),
            CheckMode::Metadata => f.write_str("metadata"),
        }
    }
}

/// Which half of the pipeline is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Walking the live tree
    Collecting,
    /// Comparing inventoried files against the backup
    Verifying,
}

/// Point-in-time sample of the run counters handed to reporters
///
/// Values are read from atomics without any coordination between them, so
/// a snapshot can be slightly inconsistent. It is only ever used for display.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressInfo {
    /// Phase being reported
    pub phase: Phase,
    /// File currently being verified
    pub current_item: Option<String>,
    /// Files discovered (collecting) or verified (verifying) so far
    pub processed: u64,
    /// Files to verify, known once collection is done
    pub total: Option<u64>,
    /// Bytes inventoried so far
    pub total_bytes: u64,
    /// Alerts drained so far
    pub total_alerts: u64,
}

impl ProgressInfo {
    /// Get progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.processed as f64 / total as f64) * 100.0),
            _ => None,
        }
    }
}

/// Number of alerts raised per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    /// Notices raised
    pub notice: u64,
    /// Warnings raised
    pub warning: u64,
    /// Critical alerts raised
    pub critical: u64,
}

impl AlertCounts {
    /// Total number of alerts of any severity
    pub fn total(&self) -> u64 {
        self.notice + self.warning + self.critical
    }
}

/// Outcome of a finished (or interrupted) run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Root of the live tree
    pub live_root: PathBuf,
    /// Root of the backup tree
    pub backup_root: PathBuf,
    /// Policy used for the run
    pub mode: CheckMode,
    /// Files compared against the backup
    pub files_checked: u64,
    /// Files found in the live tree
    pub total_files: u64,
    /// Bytes found in the live tree
    pub total_bytes: u64,
    /// Alerts raised, per severity
    pub alerts: AlertCounts,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
    /// Whether the run was interrupted
    pub cancelled: bool,
    /// When the run ended
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Total alerts of any severity
    pub fn total_alerts(&self) -> u64 {
        self.alerts.total()
    }

    /// Whether any corruption or absence signal was raised
    pub fn has_critical(&self) -> bool {
        self.alerts.critical > 0
    }
}

/// Options recognised by a run
///
/// The roots are stored as given; `PipelineBuilder::build` canonicalises
/// them and checks that they exist.
#[derive(Debug, Clone, Serialize)]
pub struct CheckConfig {
    /// Root of the live tree
    pub live_root: PathBuf,
    /// Root of the backup tree
    pub backup_root: PathBuf,
    /// Optional file with one exclusion glob per line
    pub exclude_file: Option<PathBuf>,
    /// Comparison policy
    pub mode: CheckMode,
    /// Allowed lag of the backup mtime behind the live mtime
    pub mtime_tolerance_secs: u64,
    /// Severity used when a live file has no backup counterpart
    pub missing_severity: Severity,
    /// Number of verification workers (1 = sequential)
    pub workers: usize,
    /// Interval between two progress samples
    pub tick_interval: Duration,
}

impl CheckConfig {
    /// Create a configuration with default options for the given roots
    pub fn new(live_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            live_root: live_root.into(),
            backup_root: backup_root.into(),
            exclude_file: None,
            mode: CheckMode::default(),
            mtime_tolerance_secs: DEFAULT_MTIME_TOLERANCE_SECS,
            missing_severity: Severity::Critical,
            workers: 1,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Allowed mtime lag as a `Duration`
    pub fn mtime_tolerance(&self) -> Duration {
        Duration::from_secs(self.mtime_tolerance_secs)
    }
}

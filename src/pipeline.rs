//! Two-phase orchestration
//!
//! A run is made of two phases executed one after the other:
//!
//! 1. **Collecting**: a blocking worker walks the live tree and builds the
//!    [`Inventory`]
//! 2. **Verifying**: a blocking worker consumes that inventory and compares
//!    every file against its backup counterpart
//!
//! While a phase worker runs, the orchestrating task wakes up once per tick
//! interval, drains the [`AlertSink`] and hands a counter snapshot plus the
//! drained alerts to the [`Reporter`]. When the worker finishes one more
//! tick is delivered so the reporter always sees the final state of the
//! phase, including alerts raised after the last periodic tick.
//!
//! The inventory is moved from the first phase into the second; nothing else
//! is shared between them apart from the counters and the sink.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mirrorguard::{CheckMode, PipelineBuilder, SilentReporter};
//!
//! # async fn demo() -> mirrorguard::Result<()> {
//! let pipeline = PipelineBuilder::new()
//!     .mode(CheckMode::Metadata)
//!     .exclude("**/.cache")
//!     .build("/data", "/mnt/backup/data")?;
//!
//! let summary = pipeline.run(&SilentReporter).await?;
//! println!("{} files, {} alerts", summary.files_checked, summary.total_alerts());
//! # Ok(())
//! # }
//! ```

use crate::alerts::AlertSink;
use crate::compare::ComparisonEngine;
use crate::counters::RunCounters;
use crate::error::{MirrorError, Result};
use crate::exclusion::ExclusionFilter;
use crate::inventory::{Inventory, TreeInventory};
use crate::path_map::PathMapper;
use crate::progress::Reporter;
use crate::types::{
    CheckConfig, CheckMode, Phase, RunSummary, Severity, DEFAULT_MTIME_TOLERANCE_SECS,
    DEFAULT_TICK_INTERVAL,
};
use chrono::Utc;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shared interruption flag
///
/// Cloning yields a handle to the same flag. Workers poll it once per entry
/// and the hasher once per chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builder for creating a [`Pipeline`] with custom options
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    mode: CheckMode,
    mtime_tolerance: Duration,
    missing_severity: Severity,
    patterns: Vec<String>,
    exclude_file: Option<PathBuf>,
    workers: usize,
    tick_interval: Duration,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a builder with default settings
    ///
    /// Metadata mode, 24 hour tolerance, missing backups reported as
    /// critical, a single verification worker and one tick per second.
    pub fn new() -> Self {
        Self {
            mode: CheckMode::default(),
            mtime_tolerance: Duration::from_secs(DEFAULT_MTIME_TOLERANCE_SECS),
            missing_severity: Severity::Critical,
            patterns: Vec::new(),
            exclude_file: None,
            workers: 1,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the comparison policy
    pub fn mode(mut self, mode: CheckMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how far a backup may lag behind the live file before a warning
    pub fn mtime_tolerance(mut self, tolerance: Duration) -> Self {
        self.mtime_tolerance = tolerance;
        self
    }

    /// Set the severity of a missing backup counterpart
    pub fn missing_severity(mut self, severity: Severity) -> Self {
        self.missing_severity = severity;
        self
    }

    /// Add one directory exclusion glob
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Add several directory exclusion globs
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Read additional exclusion globs from a file, one per line
    pub fn exclude_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude_file = Some(path.into());
        self
    }

    /// Set the number of verification workers
    ///
    /// With more than one worker, files are verified in parallel on a
    /// dedicated thread pool and alerts arrive in no particular order.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the interval between two progress ticks
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Validate the options and the two roots and create the pipeline
    ///
    /// Both roots are canonicalised, so symbolic links in them are resolved
    /// once here and paths reported later are stable. Exclusion globs are
    /// still matched against the live root as it was spelled, too.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::LiveRootMissing`] / [`MirrorError::BackupRootMissing`]
    ///   if a root does not exist or is not a directory
    /// - [`MirrorError::ExcludeFile`] / [`MirrorError::InvalidPattern`] for a
    ///   bad exclusion list
    /// - [`MirrorError::InvalidConfiguration`] for zero workers, a zero tick
    ///   interval, or two roots resolving to the same directory
    pub fn build(self, live_root: impl AsRef<Path>, backup_root: impl AsRef<Path>) -> Result<Pipeline> {
        let live_root = live_root.as_ref();
        let backup_root = backup_root.as_ref();

        let live = canonical_dir(live_root)
            .ok_or_else(|| MirrorError::LiveRootMissing(live_root.to_path_buf()))?;
        let backup = canonical_dir(backup_root)
            .ok_or_else(|| MirrorError::BackupRootMissing(backup_root.to_path_buf()))?;

        let live_alias = std::path::absolute(live_root).ok().filter(|given| *given != live);

        if live == backup {
            return Err(MirrorError::invalid_config(format!(
                "live and backup roots are the same directory: {:?}",
                live
            )));
        }
        if self.workers == 0 {
            return Err(MirrorError::invalid_config("workers must be at least 1"));
        }
        if self.tick_interval.is_zero() {
            return Err(MirrorError::invalid_config("tick interval must be greater than zero"));
        }

        let mut patterns = self.patterns;
        if let Some(path) = &self.exclude_file {
            patterns.extend(ExclusionFilter::from_file(path)?.patterns().iter().cloned());
        }
        let exclusions = ExclusionFilter::new(patterns)?;

        let config = CheckConfig {
            live_root: live,
            backup_root: backup,
            exclude_file: self.exclude_file,
            mode: self.mode,
            mtime_tolerance_secs: self.mtime_tolerance.as_secs(),
            missing_severity: self.missing_severity,
            workers: self.workers,
            tick_interval: self.tick_interval,
        };

        debug!(
            "Pipeline ready: {:?} -> {:?} ({} mode, {} exclusions, {} workers)",
            config.live_root,
            config.backup_root,
            config.mode,
            exclusions.len(),
            config.workers
        );

        Ok(Pipeline {
            config,
            exclusions,
            live_alias,
            cancel: CancelFlag::new(),
        })
    }
}

fn canonical_dir(path: &Path) -> Option<PathBuf> {
    let canonical = path.canonicalize().ok()?;
    canonical.is_dir().then_some(canonical)
}

/// A validated run, ready to be executed
#[derive(Debug)]
pub struct Pipeline {
    config: CheckConfig,
    exclusions: ExclusionFilter,
    /// Live root as given, when it differs from the canonical one
    live_alias: Option<PathBuf>,
    cancel: CancelFlag,
}

impl Pipeline {
    /// Create a pipeline from a configuration record
    pub fn from_config(config: CheckConfig) -> Result<Self> {
        let mut builder = PipelineBuilder::new()
            .mode(config.mode)
            .mtime_tolerance(config.mtime_tolerance())
            .missing_severity(config.missing_severity)
            .workers(config.workers)
            .tick_interval(config.tick_interval);
        if let Some(path) = config.exclude_file {
            builder = builder.exclude_file(path);
        }
        builder.build(config.live_root, config.backup_root)
    }

    /// Effective configuration, with canonical roots
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Compiled exclusion rules
    pub fn exclusions(&self) -> &ExclusionFilter {
        &self.exclusions
    }

    /// Handle that interrupts the run when raised
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn engine(&self) -> ComparisonEngine {
        ComparisonEngine::new(PathMapper::new(&self.config.live_root, &self.config.backup_root))
            .with_mode(self.config.mode)
            .with_mtime_tolerance(self.config.mtime_tolerance())
            .with_missing_severity(self.config.missing_severity)
            .with_cancel(self.cancel.clone())
    }

    /// Execute both phases and summarise the run
    ///
    /// A raised cancel flag stops the active worker at its next entry; the
    /// summary then has `cancelled` set and only counts what was done.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::Worker`] if a phase worker panicked
    /// - [`MirrorError::ThreadPool`] if the verification pool cannot start
    pub async fn run(&self, reporter: &dyn Reporter) -> Result<RunSummary> {
        let start = Instant::now();
        let counters = Arc::new(RunCounters::new());
        let sink = Arc::new(AlertSink::new(Arc::clone(&counters)));

        info!("Collecting inventory of {:?}", self.config.live_root);
        let mut walker = TreeInventory::new(&self.config.live_root).with_exclusions(self.exclusions.clone());
        if let Some(alias) = &self.live_alias {
            walker = walker.with_root_alias(alias);
        }
        let inventory = {
            let (worker_counters, worker_sink) = (Arc::clone(&counters), Arc::clone(&sink));
            let cancel = self.cancel.clone();
            self.run_phase(Phase::Collecting, &counters, &sink, reporter, move || {
                walker.collect(&worker_counters, &worker_sink, &cancel)
            })
            .await?
        };

        if self.cancel.is_cancelled() {
            warn!("Run cancelled during collection");
        } else {
            info!(
                "Verifying {} files against {:?}",
                inventory.file_count(),
                self.config.backup_root
            );
            let engine = self.engine();
            let workers = self.config.workers;
            let (worker_counters, worker_sink) = (Arc::clone(&counters), Arc::clone(&sink));
            let cancel = self.cancel.clone();
            self.run_phase(Phase::Verifying, &counters, &sink, reporter, move || {
                verify(&engine, inventory, &worker_counters, &worker_sink, &cancel, workers)
            })
            .await??;
        }

        let summary = RunSummary {
            live_root: self.config.live_root.clone(),
            backup_root: self.config.backup_root.clone(),
            mode: self.config.mode,
            files_checked: counters.files_processed(),
            total_files: counters.total_files(),
            total_bytes: counters.total_bytes(),
            alerts: counters.alert_counts(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            cancelled: self.cancel.is_cancelled(),
            finished_at: Utc::now(),
        };

        info!(
            "Checked {} files in {:?}: {} alerts",
            summary.files_checked,
            start.elapsed(),
            summary.total_alerts()
        );

        reporter.finished(&summary);
        Ok(summary)
    }

    /// Run `work` on a blocking thread, ticking the reporter until it ends
    async fn run_phase<T, F>(
        &self,
        phase: Phase,
        counters: &RunCounters,
        sink: &AlertSink,
        reporter: &dyn Reporter,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        reporter.phase_started(phase, &counters.snapshot(phase));

        let mut worker = tokio::task::spawn_blocking(work);
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let joined = loop {
            tokio::select! {
                joined = &mut worker => break joined,
                _ = ticker.tick() => {
                    let alerts = sink.drain();
                    reporter.tick(&counters.snapshot(phase), &alerts);
                }
            }
        };

        let alerts = sink.drain();
        let info = counters.snapshot(phase);
        reporter.tick(&info, &alerts);
        reporter.phase_finished(phase, &info);

        debug!("{:?} phase finished in {:?}", phase, started.elapsed());
        joined.map_err(|e| MirrorError::Worker(format!("{:?} worker: {}", phase, e)))
    }
}

/// Compare every inventoried file against the backup
fn verify(
    engine: &ComparisonEngine,
    mut inventory: Inventory,
    counters: &RunCounters,
    sink: &AlertSink,
    cancel: &CancelFlag,
    workers: usize,
) -> Result<()> {
    if workers <= 1 {
        while let Some(relative) = inventory.pop() {
            if cancel.is_cancelled() {
                info!("Verification cancelled with {} files left", inventory.len() + 1);
                break;
            }
            verify_one(engine, &relative, counters, sink);
        }
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("mirrorguard-verify-{}", i))
        .build()?;

    let paths = inventory.into_paths();
    pool.install(|| {
        paths.par_iter().for_each(|relative| {
            if !cancel.is_cancelled() {
                verify_one(engine, relative, counters, sink);
            }
        })
    });

    Ok(())
}

fn verify_one(engine: &ComparisonEngine, relative: &Path, counters: &RunCounters, sink: &AlertSink) {
    counters.set_current(relative);
    let alerts = engine.check(relative);
    if !alerts.is_empty() {
        sink.extend(alerts);
    }
    counters.record_processed();
}

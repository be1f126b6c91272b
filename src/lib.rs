//! # Mirrorguard - Backup integrity checking
//!
//! Walks a live directory tree and checks that a backup copy of it looks
//! healthy, raising alerts only for hard absences and unambiguous corruption
//! signals.
//!
//! ## Overview
//!
//! A backup is usually a stale copy of the live tree: files change after the
//! last backup ran, new files appear. Flagging every difference would bury
//! real problems in noise, so mirrorguard leans towards silence and reports:
//!
//! - Live files with no counterpart in the backup
//! - Two copies claiming the same modification time but differing in size
//!   (metadata mode) or content (hash mode)
//! - Backups lagging further behind the live file than a tolerance (24 hours
//!   by default)
//! - Directories skipped by an exclusion rule, as notices
//!
//! ## Architecture
//!
//! A run has two phases, each executed by one blocking worker while the
//! orchestrating task samples progress once per tick:
//!
//! 1. **Collection**: [`TreeInventory`] walks the live tree, prunes excluded
//!    directories and builds an [`Inventory`] of live-relative paths
//! 2. **Verification**: [`ComparisonEngine`] consumes the inventory and
//!    compares every file against the backup through a [`PathMapper`]
//!
//! Workers push alerts into an [`AlertSink`]; every tick drains it and hands
//! the batch to a [`Reporter`] with a [`ProgressInfo`] snapshot of the shared
//! [`RunCounters`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mirrorguard::{PipelineBuilder, TerminalReporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = PipelineBuilder::new()
//!         .exclude("**/node_modules")
//!         .build("/Users/jon", "/Volumes/Backup/Users/jon")?;
//!
//!     let summary = pipeline.run(&TerminalReporter::new()).await?;
//!     if summary.has_critical() {
//!         std::process::exit(2);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Locating a snapshot volume
//!
//! ```rust
//! use mirrorguard::{BackupLocator, SnapshotVolumeLayout};
//! use std::path::{Path, PathBuf};
//!
//! let layout = SnapshotVolumeLayout::new("TM", "macbook", "Macintosh HD");
//! assert_eq!(
//!     layout.locate(Path::new("/Users/jon")),
//!     PathBuf::from("/Volumes/TM/Backups.backupdb/macbook/Latest/Macintosh HD/Users/jon")
//! );
//! ```
//!
//! ### Checking a single file
//!
//! ```rust,no_run
//! use mirrorguard::{CheckMode, ComparisonEngine, PathMapper};
//! use std::path::Path;
//!
//! let engine = ComparisonEngine::new(PathMapper::new("/data", "/mnt/backup/data"))
//!     .with_mode(CheckMode::Hash);
//! for alert in engine.check(Path::new("reports/q3.pdf")) {
//!     println!("{}", alert);
//! }
//! ```
//!
//! ## Error Handling
//!
//! Only startup problems are errors (`Result<T, MirrorError>`): missing
//! roots, an unreadable exclusion file, an invalid glob, bad options.
//! Problems with individual files are recovered during the run and either
//! dropped or turned into alerts.
//!
//! ## Module Organization
//!
//! - [`pipeline`]: Two-phase orchestration, builder and cancellation
//! - [`inventory`]: Live tree walk
//! - [`compare`]: Per-file decision policy
//! - [`exclusion`]: Directory exclusion globs
//! - [`path_map`]: Live/backup path mapping
//! - [`layout`]: Backup root composition
//! - [`progress`]: Reporters
//! - [`types`]: Common types and data structures
//! - [`error`]: Error types and handling

// Public API modules
pub mod alerts;
pub mod compare;
pub mod counters;
pub mod error;
pub mod exclusion;
pub mod inventory;
pub mod layout;
pub mod path_map;
pub mod pipeline;
pub mod progress;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use alerts::AlertSink;
pub use compare::ComparisonEngine;
pub use counters::RunCounters;
pub use error::{MirrorError, Result};
pub use exclusion::ExclusionFilter;
pub use inventory::{Inventory, TreeInventory};
pub use layout::{BackupLocator, FixedBackupRoot, SnapshotVolumeLayout};
pub use path_map::PathMapper;
pub use pipeline::{CancelFlag, Pipeline, PipelineBuilder};
pub use progress::{JsonReporter, Reporter, SilentReporter, TerminalReporter};
pub use types::*;

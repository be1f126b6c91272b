//! Live tree inventory
//!
//! This module walks the live tree and collects every file that will later be
//! compared against the backup. It is the first phase of a run.
//!
//! ## Walk rules
//!
//! - **Depth-first**: entries are visited in the order `walkdir` yields them
//! - **Exclusions**: every directory below the root is tested against the
//!   [`ExclusionFilter`]; a match emits a notice and prunes the subtree.
//!   When the root was reached through a symbolic link, the directory is
//!   also tested under that [root alias](TreeInventory::with_root_alias)
//! - **Files and symlinks**: regular files and symbolic links are collected;
//!   links are never followed and count with their own `lstat` size
//! - **Other entries**: sockets, FIFOs and devices are ignored
//! - **Errors**: an entry that cannot be read (permission denied, vanished
//!   mid-walk, unreadable metadata) is dropped and the walk goes on
//!
//! ## Ordering
//!
//! The collected paths are stored reversed so the verification phase can
//! [`Inventory::pop`] them off the end and still see them in discovery order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mirrorguard::{ExclusionFilter, TreeInventory};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let inventory = TreeInventory::new("/Users/jon")
//!     .with_exclusions(ExclusionFilter::new(["**/Library/Caches"])?);
//!
//! let (files, notices) = inventory.scan();
//! println!("{} files, {} bytes, {} directories excluded",
//!     files.file_count(), files.byte_count(), notices.len());
//! # Ok(())
//! # }
//! ```

use crate::alerts::AlertSink;
use crate::counters::RunCounters;
use crate::exclusion::ExclusionFilter;
use crate::pipeline::CancelFlag;
use crate::types::Alert;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// Files collected from the live tree
///
/// Owned by the collection phase while it is being built, then moved into
/// the verification phase which consumes it.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Live-relative paths, reversed discovery order
    files: Vec<PathBuf>,
    file_count: u64,
    byte_count: u64,
}

impl Inventory {
    /// Number of files collected
    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    /// Sum of the `lstat` sizes of the collected files
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    /// Number of paths not yet consumed
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether every path has been consumed
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Take the next path in discovery order
    pub fn pop(&mut self) -> Option<PathBuf> {
        self.files.pop()
    }

    /// Remaining paths, last-discovered first
    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remaining paths, in discovery order
    pub fn into_paths(mut self) -> Vec<PathBuf> {
        self.files.reverse();
        self.files
    }
}

/// Walks a live tree and builds its [`Inventory`]
#[derive(Debug, Clone)]
pub struct TreeInventory {
    root: PathBuf,
    root_alias: Option<PathBuf>,
    exclusions: ExclusionFilter,
}

impl TreeInventory {
    /// Create an inventory walker for `root` with no exclusions
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            root_alias: None,
            exclusions: ExclusionFilter::empty(),
        }
    }

    /// Set the directory exclusion rules
    pub fn with_exclusions(mut self, exclusions: ExclusionFilter) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Another spelling of the root, such as a symbolic link pointing at it
    pub fn with_root_alias(mut self, alias: impl Into<PathBuf>) -> Self {
        self.root_alias = Some(alias.into());
        self
    }

    /// Root being walked
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First pattern excluding `dir`, under the root or its alias
    fn excluded_by(&self, dir: &Path) -> Option<&str> {
        if let Some(pattern) = self.exclusions.matching_pattern(dir) {
            return Some(pattern);
        }
        let alias = self.root_alias.as_ref()?;
        let relative = dir.strip_prefix(&self.root).ok()?;
        self.exclusions.matching_pattern(&alias.join(relative))
    }

    /// Walk the tree with private counters, returning the exclusion notices
    pub fn scan(&self) -> (Inventory, Vec<Alert>) {
        let counters = Arc::new(RunCounters::new());
        let sink = AlertSink::new(Arc::clone(&counters));
        let inventory = self.collect(&counters, &sink, &CancelFlag::new());
        (inventory, sink.drain())
    }

    /// Walk the tree
    ///
    /// Every collected file is counted into `counters` as it is found, so a
    /// reporter sampling them sees collection progress live. Exclusion
    /// notices go to `sink`. The walk stops early, returning what it has so
    /// far, once `cancel` is raised.
    pub fn collect(&self, counters: &RunCounters, sink: &AlertSink, cancel: &CancelFlag) -> Inventory {
        let start = Instant::now();
        let mut inventory = Inventory::default();
        let mut walker = WalkDir::new(&self.root).follow_links(false).into_iter();

        loop {
            if cancel.is_cancelled() {
                info!("Inventory collection cancelled after {} files", inventory.file_count);
                break;
            }

            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let file_type = entry.file_type();

            if file_type.is_dir() {
                if entry.depth() == 0 {
                    continue;
                }
                if let Some(pattern) = self.excluded_by(entry.path()) {
                    walker.skip_current_dir();
                    info!("Excluding {:?} (matched '{}')", entry.path(), pattern);
                    if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                        sink.push(Alert::notice(
                            relative,
                            format!("directory excluded by pattern '{}'", pattern),
                        ));
                    }
                }
                continue;
            }

            if !file_type.is_file() && !file_type.is_symlink() {
                trace!("Ignoring special file {:?}", entry.path());
                continue;
            }

            // walkdir reports the link's own metadata when not following links
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    debug!("Skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };

            counters.record_file(size);
            inventory.file_count += 1;
            inventory.byte_count += size;
            inventory.files.push(relative);
        }

        inventory.files.reverse();

        debug!(
            "Collected {} files ({} bytes) under {:?} in {:?}",
            inventory.file_count,
            inventory.byte_count,
            self.root,
            start.elapsed()
        );

        inventory
    }
}

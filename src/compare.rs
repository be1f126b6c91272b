//! Live/backup comparison
//!
//! The comparison engine decides, for one live file, whether its backup
//! counterpart looks healthy. Every branch leans towards silence: an alert is
//! only raised for a hard absence or for an unambiguous corruption signal,
//! i.e. two copies that claim the same modification time but differ.
//!
//! ## Metadata mode
//!
//! | Situation | Result |
//! |---|---|
//! | backup entry absent, or an ancestor is not a directory (a dangling link counts as present) | missing alert, `Critical` by default |
//! | equal mtimes, neither side a link, sizes differ | `Critical` size mismatch |
//! | live mtime ahead of backup by more than the tolerance | `Warning` out of sync |
//! | anything else | nothing |
//! | `lstat` of either side fails | `Warning` with the error text |
//!
//! ## Hash mode
//!
//! Both copies are hashed with SHA-256 on two threads joined before the
//! decision. A content difference is reported as `Critical` only when the
//! mtimes are identical. Missing backups, symbolic links, directories and any
//! I/O failure are skipped without an alert. Since differing mtimes can never
//! produce an alert, such pairs are not hashed at all. A raised
//! [`CancelFlag`] abandons a hash between two chunks.

use crate::error::{MirrorError, Result};
use crate::path_map::PathMapper;
use crate::pipeline::CancelFlag;
use crate::types::{Alert, CheckMode, Severity, DEFAULT_MTIME_TOLERANCE_SECS};
use crate::utils::{self, FileMetadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Applies the tiered decision policy to one live file at a time
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    mapper: PathMapper,
    mode: CheckMode,
    mtime_tolerance: Duration,
    missing_severity: Severity,
    cancel: CancelFlag,
}

impl ComparisonEngine {
    /// Create an engine in metadata mode with a 24 hour tolerance
    pub fn new(mapper: PathMapper) -> Self {
        Self {
            mapper,
            mode: CheckMode::default(),
            mtime_tolerance: Duration::from_secs(DEFAULT_MTIME_TOLERANCE_SECS),
            missing_severity: Severity::Critical,
            cancel: CancelFlag::new(),
        }
    }

    /// Set the comparison policy
    pub fn with_mode(mut self, mode: CheckMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how far the backup mtime may lag behind the live mtime
    pub fn with_mtime_tolerance(mut self, tolerance: Duration) -> Self {
        self.mtime_tolerance = tolerance;
        self
    }

    /// Set the severity of "missing from backup" alerts (metadata mode)
    pub fn with_missing_severity(mut self, severity: Severity) -> Self {
        self.missing_severity = severity;
        self
    }

    /// Abandon an in-flight hash once `cancel` is raised
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Policy in use
    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    /// Path mapper in use
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Compare one live-relative file with its backup counterpart
    pub fn check(&self, relative: &Path) -> Vec<Alert> {
        let alert = match self.mode {
            CheckMode::Metadata => self.check_metadata(relative),
            CheckMode::Hash => self.check_hash(relative),
        };
        alert.into_iter().collect()
    }

    fn check_metadata(&self, relative: &Path) -> Option<Alert> {
        let (live_path, backup_path) = match self.resolve(relative) {
            Ok(paths) => paths,
            Err(e) => return Some(Alert::warning(relative, e.to_string())),
        };

        let live = match utils::get_file_metadata(&live_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                return Some(Alert::warning(
                    relative,
                    format!("cannot read live file metadata: {}", e),
                ))
            }
        };

        let backup = match utils::get_file_metadata(&backup_path) {
            Ok(metadata) => metadata,
            Err(e) if is_not_found(&e) => {
                return Some(Alert::new(self.missing_severity, relative, "is missing from backup"));
            }
            Err(e) => {
                return Some(Alert::warning(
                    relative,
                    format!("cannot read backup file metadata: {}", e),
                ))
            }
        };

        self.decide_metadata(relative, &live, &backup)
    }

    fn decide_metadata(&self, relative: &Path, live: &FileMetadata, backup: &FileMetadata) -> Option<Alert> {
        if live.modified == backup.modified {
            if !live.is_symlink && !backup.is_symlink && live.size != backup.size {
                return Some(Alert::critical(
                    relative,
                    format!(
                        "size differs from backup ({} vs {} bytes) despite identical mtimes",
                        live.size, backup.size
                    ),
                ));
            }
            return None;
        }

        match live.modified.duration_since(backup.modified) {
            Ok(lag) if lag > self.mtime_tolerance => Some(Alert::warning(
                relative,
                format!(
                    "mtimes are more than {} out of sync (live {}, backup {})",
                    describe_tolerance(self.mtime_tolerance),
                    utils::format_mtime(live.modified),
                    utils::format_mtime(backup.modified)
                ),
            )),
            _ => None,
        }
    }

    fn check_hash(&self, relative: &Path) -> Option<Alert> {
        let (live_path, backup_path) = match self.resolve(relative) {
            Ok(paths) => paths,
            Err(e) => {
                debug!("Skipping {:?}: {}", relative, e);
                return None;
            }
        };

        let live = match utils::get_file_metadata(&live_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {:?}: {}", live_path, e);
                return None;
            }
        };
        let backup = match utils::get_file_metadata(&backup_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                trace!("No usable backup for {:?}: {}", relative, e);
                return None;
            }
        };

        if live.is_symlink || backup.is_symlink || live.is_dir || backup.is_dir {
            return None;
        }
        if live.modified != backup.modified {
            return None;
        }

        // Live and backup normally sit on different devices
        let (live_hash, backup_hash) = rayon::join(
            || utils::hash_file_content_until(&live_path, &self.cancel),
            || utils::hash_file_content_until(&backup_path, &self.cancel),
        );
        let (live_hash, backup_hash) = match (live_hash, backup_hash) {
            (Ok(live_hash), Ok(backup_hash)) => (live_hash, backup_hash),
            (Err(e), _) | (_, Err(e)) => {
                debug!("Unexpected error hashing {:?}, skipping: {}", relative, e);
                return None;
            }
        };

        if live_hash == backup_hash {
            return None;
        }

        // An edit that landed while hashing is not corruption
        match utils::get_file_metadata(&live_path) {
            Ok(after) if after.modified == live.modified => {}
            _ => {
                debug!("{:?} changed while being hashed, skipping", relative);
                return None;
            }
        }

        Some(Alert::critical(
            relative,
            format!(
                "content differs from backup despite identical mtimes (sha256 {} vs {})",
                &live_hash[..12],
                &backup_hash[..12]
            ),
        ))
    }

    fn resolve(&self, relative: &Path) -> Result<(PathBuf, PathBuf)> {
        Ok((self.mapper.to_live(relative)?, self.mapper.to_backup(relative)?))
    }
}

/// The entry does not exist, including when an ancestor is not a directory
fn is_not_found(err: &MirrorError) -> bool {
    matches!(
        err,
        MirrorError::Io(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
    )
}

/// "24 hours" for whole hours, humantime's rendering otherwise
fn describe_tolerance(tolerance: Duration) -> String {
    let secs = tolerance.as_secs();
    if secs > 0 && secs % 3600 == 0 && tolerance.subsec_nanos() == 0 {
        let hours = secs / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        }
    } else {
        humantime::format_duration(tolerance).to_string()
    }
}

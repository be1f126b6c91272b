//! Locating the backup tree for a live tree
//!
//! Backup tools lay their snapshots out differently, so the backup root is
//! produced by a [`BackupLocator`] instead of being templated inline. Two
//! locators ship with the crate: a fixed directory, and the conventional
//! snapshot-volume layout used by Time Machine style backups:
//!
//! ```text
//! <volumes_dir>/<volume>/Backups.backupdb/<machine>/Latest/<drive>/<live root>
//! ```

use std::path::{Component, Path, PathBuf};

/// Produces the backup root that mirrors a given live root
pub trait BackupLocator {
    /// Backup directory corresponding to `live_root`
    fn locate(&self, live_root: &Path) -> PathBuf;
}

/// The backup root is a known directory
#[derive(Debug, Clone)]
pub struct FixedBackupRoot(pub PathBuf);

impl BackupLocator for FixedBackupRoot {
    fn locate(&self, _live_root: &Path) -> PathBuf {
        self.0.clone()
    }
}

/// Latest snapshot on a mounted backup volume
///
/// The live root is appended below the drive directory with its root and
/// prefix components removed, so `/Users/jon` on drive `Fusion` maps to
/// `.../Latest/Fusion/Users/jon`.
#[derive(Debug, Clone)]
pub struct SnapshotVolumeLayout {
    /// Mount point directory holding backup volumes
    pub volumes_dir: PathBuf,
    /// Name of the backup volume
    pub volume: String,
    /// Name of the machine whose backups are stored on the volume
    pub machine: String,
    /// Name of the source drive inside the snapshot
    pub drive: String,
}

impl SnapshotVolumeLayout {
    /// Layout rooted at the default `/Volumes` mount directory
    pub fn new(volume: impl Into<String>, machine: impl Into<String>, drive: impl Into<String>) -> Self {
        Self {
            volumes_dir: PathBuf::from("/Volumes"),
            volume: volume.into(),
            machine: machine.into(),
            drive: drive.into(),
        }
    }

    /// Use a different mount directory
    pub fn with_volumes_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.volumes_dir = dir.into();
        self
    }

    /// Directory of the most recent snapshot of the drive
    pub fn latest_snapshot(&self) -> PathBuf {
        self.volumes_dir
            .join(&self.volume)
            .join("Backups.backupdb")
            .join(&self.machine)
            .join("Latest")
            .join(&self.drive)
    }
}

impl BackupLocator for SnapshotVolumeLayout {
    fn locate(&self, live_root: &Path) -> PathBuf {
        let mut root = self.latest_snapshot();
        for component in live_root.components() {
            if let Component::Normal(part) = component {
                root.push(part);
            }
        }
        root
    }
}

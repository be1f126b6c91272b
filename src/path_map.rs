//! Mapping between live and backup paths
//!
//! A file is identified by its path relative to the tree root. `PathMapper`
//! turns such a relative path into an absolute path under either root and
//! strips a root back off again. It never touches the filesystem.
//!
//! Relative paths accepted here only contain normal components (`.` is
//! dropped); anything that could escape a root, such as `..`, a drive prefix
//! or a leading `/`, is rejected. This keeps the mapping collision-free:
//! two distinct live files always map to two distinct backup files.

use crate::error::{MirrorError, Result};
use std::path::{Component, Path, PathBuf};

/// Translates paths between the live tree and the backup tree
#[derive(Debug, Clone)]
pub struct PathMapper {
    live_root: PathBuf,
    backup_root: PathBuf,
}

impl PathMapper {
    /// Create a mapper for the given pair of roots
    pub fn new(live_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            live_root: live_root.into(),
            backup_root: backup_root.into(),
        }
    }

    /// Root of the live tree
    pub fn live_root(&self) -> &Path {
        &self.live_root
    }

    /// Root of the backup tree
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Absolute path of a live-relative file inside the live tree
    pub fn to_live(&self, relative: &Path) -> Result<PathBuf> {
        join_under(&self.live_root, relative)
    }

    /// Absolute path of a live-relative file inside the backup tree
    pub fn to_backup(&self, relative: &Path) -> Result<PathBuf> {
        join_under(&self.backup_root, relative)
    }

    /// Strip the live root off a path discovered during the walk
    pub fn relativize_live(&self, path: &Path) -> Result<PathBuf> {
        strip_root(path, &self.live_root)
    }

    /// Strip the backup root off a backup path
    pub fn relativize_backup(&self, path: &Path) -> Result<PathBuf> {
        strip_root(path, &self.backup_root)
    }
}

fn join_under(root: &Path, relative: &Path) -> Result<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MirrorError::PathOutsideRoot {
                    path: relative.to_path_buf(),
                    root: root.to_path_buf(),
                });
            }
        }
    }
    Ok(joined)
}

fn strip_root(path: &Path, root: &Path) -> Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| MirrorError::PathOutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
}

//! Error types for mirrorguard
//!
//! Only startup problems are surfaced as errors: a missing live root, a
//! missing backup root, an unreadable exclusion file or a bad glob. Problems
//! with individual entries during a run are recovered where they happen and
//! either dropped or downgraded to alerts, so they never show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the mirrorguard library
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Main error type for all mirrorguard operations
#[derive(Debug, Error)]
pub enum MirrorError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The live tree root does not exist or is not a directory
    #[error("Live root not found: {0:?}")]
    LiveRootMissing(PathBuf),

    /// The backup tree root does not exist or is not a directory
    #[error("Backup root not found: {0:?}")]
    BackupRootMissing(PathBuf),

    /// A glob in the exclusion list could not be compiled
    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why globset rejected it
        reason: String,
    },

    /// The exclusion file could not be read
    #[error("Cannot read exclusion file {path:?}: {source}")]
    ExcludeFile {
        /// Path of the exclusion file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A path could not be expressed relative to a tree root
    #[error("Path {path:?} is not under root {root:?}")]
    PathOutsideRoot {
        /// Path that was being mapped
        path: PathBuf,
        /// Root it was expected to live under
        root: PathBuf,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Worker thread panicked or could not be joined
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rayon::ThreadPoolBuildError> for MirrorError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        MirrorError::ThreadPool(err.to_string())
    }
}

impl MirrorError {
    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        MirrorError::Internal(msg.into())
    }

    /// Create a configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        MirrorError::InvalidConfiguration(msg.into())
    }

    /// Check if this error must stop the run before any work begins
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MirrorError::LiveRootMissing(_)
                | MirrorError::BackupRootMissing(_)
                | MirrorError::InvalidPattern { .. }
                | MirrorError::ExcludeFile { .. }
                | MirrorError::InvalidConfiguration(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            MirrorError::LiveRootMissing(path) => {
                format!("Live directory {:?} does not exist. Pass an existing directory to check.", path)
            }
            MirrorError::BackupRootMissing(path) => {
                format!(
                    "Backup directory {:?} does not exist. Is the backup volume mounted?",
                    path
                )
            }
            MirrorError::ExcludeFile { path, source } => {
                format!("Cannot read exclusion file {:?} ({}). Check the path passed to --exclude-file.", path, source)
            }
            _ => self.to_string(),
        }
    }
}

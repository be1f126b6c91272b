//! Directory exclusion rules
//!
//! Exclusion rules are glob patterns matched against the full path of each
//! directory met during the walk. A matching directory is pruned together
//! with everything below it. Files are never tested: excluding a directory is
//! the only way to keep files out of the inventory.
//!
//! Patterns are compiled with `literal_separator` enabled, so `*` stays
//! inside one path component and `**` is needed to span several:
//!
//! ```text
//! # Skip caches anywhere
//! **/.cache
//! **/node_modules
//!
//! # Skip scratch directories directly under /data
//! /data/tmp*
//! ```
//!
//! The set is built once at startup and is immutable for the rest of the run.

use crate::error::{MirrorError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Compiled set of exclusion globs
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    set: GlobSet,
    patterns: Vec<String>,
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExclusionFilter {
    /// A filter that excludes nothing
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compile a list of glob patterns
    ///
    /// # Errors
    ///
    /// - [`MirrorError::InvalidPattern`] if any pattern is not a valid glob
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for pattern in patterns {
            let pattern = pattern.into();
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| MirrorError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
            builder.add(glob);
            kept.push(pattern);
        }

        let set = builder.build().map_err(|e| MirrorError::InvalidPattern {
            pattern: kept.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self { set, patterns: kept })
    }

    /// Parse an exclusion list: one pattern per line
    ///
    /// Surrounding whitespace is trimmed; blank lines and lines starting
    /// with `#` are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Load an exclusion list from a file
    ///
    /// # Errors
    ///
    /// - [`MirrorError::ExcludeFile`] if the file cannot be read
    /// - [`MirrorError::InvalidPattern`] if a line is not a valid glob
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| MirrorError::ExcludeFile {
            path: path.to_path_buf(),
            source,
        })?;
        let filter = Self::parse(&text)?;
        debug!("Loaded {} exclusion patterns from {:?}", filter.len(), path);
        Ok(filter)
    }

    /// The patterns in the order they were given
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the filter has no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern matching a directory path, if any
    pub fn matching_pattern(&self, dir: &Path) -> Option<&str> {
        if self.is_empty() {
            return None;
        }
        self.set
            .matches(dir)
            .first()
            .map(|&idx| self.patterns[idx].as_str())
    }

    /// Whether a directory (and its whole subtree) is excluded
    pub fn is_excluded(&self, dir: &Path) -> bool {
        !self.is_empty() && self.set.is_match(dir)
    }
}

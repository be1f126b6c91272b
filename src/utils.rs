//! Utility functions for mirrorguard
//!
//! ### File Operations
//! - Streaming content hashing (SHA-256)
//! - Metadata extraction without following symbolic links
//!
//! ### Formatting
//! - Human-readable byte sizes and counts
//! - Modification timestamps
//!
//! All functions are thread-safe and can be called concurrently; hashing of
//! the live and the backup copy of a file runs on two threads at once.

use crate::error::Result;
use crate::pipeline::CancelFlag;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::time::SystemTime;

/// Chunk size used when streaming a file through the hasher
pub const HASH_BUFFER_SIZE: usize = 8192;

/// Hash a file's content using SHA-256
///
/// The file is read in fixed-size chunks so memory use does not depend on
/// the file size.
///
/// # Returns
///
/// Returns the SHA-256 hash as a 64-character hexadecimal string.
///
/// # Errors
///
/// - [`MirrorError::Io`](crate::MirrorError::Io) if the file cannot be opened or read
pub fn hash_file_content(path: &Path) -> Result<String> {
    hash_file_content_until(path, &CancelFlag::new())
}

/// Hash a file's content, giving up between two chunks once `cancel` is raised
///
/// # Errors
///
/// - [`MirrorError::Io`](crate::MirrorError::Io) if the file cannot be read,
///   or with [`ErrorKind::Interrupted`] when cancelled
pub fn hash_file_content_until(path: &Path, cancel: &CancelFlag) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Err(io::Error::new(ErrorKind::Interrupted, "hashing cancelled").into());
        }
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Get file metadata without following symbolic links
///
/// Uses `symlink_metadata`, so a symbolic link reports its own size and
/// modification time, and a dangling link still counts as existing.
///
/// # Errors
///
/// - [`MirrorError::Io`](crate::MirrorError::Io) if the entry doesn't exist or cannot be accessed
pub fn get_file_metadata(path: &Path) -> Result<FileMetadata> {
    let metadata = fs::symlink_metadata(path)?;
    let file_type = metadata.file_type();

    Ok(FileMetadata {
        size: metadata.len(),
        modified: metadata.modified()?,
        is_symlink: file_type.is_symlink(),
        is_dir: file_type.is_dir(),
    })
}

/// Identity signals of one file, read on demand and never cached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    /// Size in bytes (of the link itself for symbolic links)
    pub size: u64,
    /// Last modification timestamp
    pub modified: SystemTime,
    /// Whether this is a symbolic link
    pub is_symlink: bool,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// Format bytes in human-readable form
///
/// ```rust,ignore
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format a count with thousands separators (`1234567` -> `1,234,567`)
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Render a modification time as an RFC 3339 UTC timestamp
pub fn format_mtime(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Single-threaded directory walking using walkdir
//! - Capturing the file metadata the matcher compares on
//! - Content hashing with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! // Configure the walker
//! let config = WalkerConfig {
//!     min_size: Some(1024),  // Skip files under 1KB
//!     one_file_system: true, // Stay on the root's filesystem
//!     ..Default::default()
//! };
//!
//! // Walk the directory
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.meta.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{Hash, Hasher, PARTIAL_HASH_SIZE};
pub use walker::Walker;

/// Filesystem metadata captured when a file is registered.
///
/// Captured once and never refreshed: a record reflects the filesystem at
/// scan time, not at link time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMeta {
    /// File size in bytes
    pub size: u64,
    /// Device id of the containing filesystem
    pub dev: u64,
    /// Inode number
    pub ino: u64,
    /// Permission bits and file type (`st_mode`)
    pub mode: u32,
    /// Owning user id
    pub uid: u32,
    /// Owning group id
    pub gid: u32,
    /// Modification time as (seconds, nanoseconds)
    pub mtime: (i64, i64),
    /// Status-change time as (seconds, nanoseconds)
    pub ctime: (i64, i64),
}

impl FileMeta {
    /// Capture the fields the matcher compares on.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            size: metadata.size(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mtime: (metadata.mtime(), metadata.mtime_nsec()),
            ctime: (metadata.ctime(), metadata.ctime_nsec()),
        }
    }

    /// Capture the fields available on this platform.
    ///
    /// Device, inode and ownership are not exposed here, so hard links and
    /// owner criteria never distinguish files.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or((0, 0), |d| (d.as_secs() as i64, i64::from(d.subsec_nanos())));

        Self {
            size: metadata.len(),
            mtime,
            ..Self::default()
        }
    }

    /// Stat `path` without following a final symlink.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be examined.
    pub fn read(path: &Path) -> io::Result<Self> {
        std::fs::symlink_metadata(path).map(|m| Self::from_metadata(&m))
    }

    /// Whether both records describe the same underlying file.
    ///
    /// An inode of 0 means the platform did not report one and never matches.
    #[must_use]
    pub fn same_file(&self, other: &Self) -> bool {
        self.ino != 0 && self.dev == other.dev && self.ino == other.ino
    }
}

/// A regular file discovered by the walker.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path to the file as reached from the walk root
    pub path: PathBuf,
    /// Metadata captured during the walk
    pub meta: FileMeta,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, meta: FileMeta) -> Self {
        Self { path, meta }
    }
}

/// Configuration for directory walking.
///
/// Controls the size bounds and the cross-device restriction.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Minimum file size to include (in bytes).
    /// Files smaller than this are skipped.
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    /// Files larger than this are skipped.
    pub max_size: Option<u64>,

    /// Do not descend into directories on other filesystems.
    pub one_file_system: bool,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(min_size: Option<u64>, max_size: Option<u64>, one_file_system: bool) -> Self {
        Self {
            min_size,
            max_size,
            one_file_system,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file vanished between scan and hash time.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

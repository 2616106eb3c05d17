//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing BLAKE3 digests of
//! file contents. Files are streamed through a fixed-size buffer, so memory
//! use does not depend on file size.
//!
//! Both digests the matcher uses are prefix hashes:
//! - **Partial hash**: the first [`PARTIAL_HASH_SIZE`] bytes of a file (or a
//!   configured window)
//! - **Full hash**: the file up to its size recorded at scan time
//!
//! # Example
//!
//! ```no_run
//! use dupelink::scanner::{Hasher, PARTIAL_HASH_SIZE};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let digest = hasher.hash_prefix(Path::new("movie.mkv"), PARTIAL_HASH_SIZE).unwrap();
//! println!("{} bytes read", hasher.bytes_read());
//! # let _ = digest;
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::HashError;

/// A 256-bit BLAKE3 digest.
pub type Hash = [u8; 32];

/// Number of leading bytes covered by the partial hash (16 MiB).
///
/// Large files that merely share a common prefix are told apart here without
/// reading them completely.
pub const PARTIAL_HASH_SIZE: u64 = 16 * 1024 * 1024;

/// Read buffer size used while streaming file contents.
const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 hasher.
///
/// Keeps a running count of the bytes it has read so callers can verify how
/// much I/O a duplicate search actually cost.
#[derive(Debug)]
pub struct Hasher {
    bytes_read: AtomicU64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes_read: AtomicU64::new(0),
        }
    }

    /// Hash at most `limit` leading bytes of the file at `path`.
    ///
    /// A file shorter than `limit` is hashed completely.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn hash_prefix(&self, path: &Path, limit: u64) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.hash_reader(file.take(limit))
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Total number of bytes read by this hasher so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<Hash> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let count = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..count]);
            self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

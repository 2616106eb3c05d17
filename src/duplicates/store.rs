//! Append-only storage for registered files.
//!
//! # Overview
//!
//! Paths are spooled to an anonymous temporary file as NUL-terminated byte
//! strings, so a scan of millions of files does not keep every path on the
//! heap. Each [`FileRecord`] holds the offset of its path plus the metadata
//! captured at registration.
//!
//! [`RecordStore::finalize`] flushes the spool and maps it read-only. From
//! then on paths are addressed directly inside the mapping. The mapping and
//! the temporary file are released when the store is dropped, whether or not
//! finalize ran.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;

use crate::scanner::{FileMeta, Hash};

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The temporary spool file could not be created.
    #[error("cannot create temporary storage: {0}")]
    Create(#[source] io::Error),

    /// Writing a path to the spool failed.
    #[error("cannot write path {path} to temporary storage: {source}")]
    Io {
        /// Path that was being registered
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Flushing or mapping the spool failed.
    #[error("cannot map temporary storage: {0}")]
    Map(#[source] io::Error),

    /// The store no longer accepts registrations.
    #[error("record store is already finalized")]
    Finalized,
}

/// Index of a record in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

/// Lazily computed content digests of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashState {
    /// Nothing hashed yet.
    #[default]
    Unhashed,
    /// The leading bytes have been hashed.
    Partial(Hash),
    /// Both digests are known.
    Full {
        /// Digest of the leading bytes
        partial: Hash,
        /// Digest of the whole file
        full: Hash,
    },
}

impl HashState {
    /// The partial digest, if computed.
    #[must_use]
    pub fn partial(&self) -> Option<Hash> {
        match *self {
            Self::Unhashed => None,
            Self::Partial(partial) | Self::Full { partial, .. } => Some(partial),
        }
    }

    /// The full digest, if computed.
    #[must_use]
    pub fn full(&self) -> Option<Hash> {
        match *self {
            Self::Full { full, .. } => Some(full),
            _ => None,
        }
    }
}

/// One registered regular file.
#[derive(Debug)]
pub struct FileRecord {
    /// Byte offset of the NUL-terminated path in the path store
    pub path_offset: u64,
    /// Metadata captured at registration
    pub meta: FileMeta,
    hash_state: Cell<HashState>,
}

impl FileRecord {
    fn new(path_offset: u64, meta: FileMeta) -> Self {
        Self {
            path_offset,
            meta,
            hash_state: Cell::new(HashState::Unhashed),
        }
    }

    /// Current hash state.
    #[must_use]
    pub fn hash_state(&self) -> HashState {
        self.hash_state.get()
    }

    pub(crate) fn set_hash_state(&self, state: HashState) {
        self.hash_state.set(state);
    }
}

/// Read-only view of the finalized path store.
#[derive(Debug, Default)]
pub struct PathRegion {
    map: Option<Mmap>,
}

impl PathRegion {
    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Raw path bytes starting at `offset`, without the terminating NUL.
    #[must_use]
    pub fn path_bytes(&self, offset: u64) -> &[u8] {
        let bytes = self.bytes();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        let tail = &bytes[start..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        &tail[..end]
    }

    /// The path starting at `offset`.
    #[must_use]
    pub fn path(&self, offset: u64) -> &Path {
        bytes_to_path(self.path_bytes(offset))
    }
}

/// Append-only record store backed by a temporary spool file.
#[derive(Debug)]
pub struct RecordStore {
    spool: Option<BufWriter<File>>,
    spool_len: u64,
    records: Vec<FileRecord>,
    region: PathRegion,
}

impl RecordStore {
    /// Create an empty store with a fresh anonymous spool file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Create`] if the temporary file cannot be created.
    pub fn new() -> Result<Self, StoreError> {
        let file = tempfile::tempfile().map_err(StoreError::Create)?;
        Ok(Self {
            spool: Some(BufWriter::new(file)),
            spool_len: 0,
            records: Vec::new(),
            region: PathRegion::default(),
        })
    }

    /// Append a path and its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Finalized`] after [`finalize`](Self::finalize),
    /// or [`StoreError::Io`] if the spool cannot be written. A failed
    /// registration leaves no record behind.
    pub fn register(&mut self, path: &Path, meta: FileMeta) -> Result<RecordId, StoreError> {
        let spool = self.spool.as_mut().ok_or(StoreError::Finalized)?;

        // One write per entry: a failed write then appends nothing.
        let mut entry = path_to_bytes(path).into_owned();
        entry.push(0);
        spool.write_all(&entry).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let id = RecordId(self.records.len());
        self.records.push(FileRecord::new(self.spool_len, meta));
        self.spool_len += entry.len() as u64;

        Ok(id)
    }

    /// Number of records registered so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Whether the store has been finalized.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.spool.is_none()
    }

    /// Stop accepting registrations and map the path store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Finalized`] if called twice, or
    /// [`StoreError::Map`] if the spool cannot be flushed or mapped.
    pub fn finalize(&mut self) -> Result<(), StoreError> {
        let spool = self.spool.take().ok_or(StoreError::Finalized)?;
        let file = spool
            .into_inner()
            .map_err(|e| StoreError::Map(e.into_error()))?;

        if self.spool_len == 0 {
            return Ok(());
        }

        // SAFETY: the spool is an unlinked temporary file owned by this store
        // and is never written again after this point.
        let map = unsafe { Mmap::map(&file) }.map_err(StoreError::Map)?;
        log::debug!(
            "Mapped {} bytes of paths for {} records",
            map.len(),
            self.records.len()
        );
        self.region = PathRegion { map: Some(map) };

        Ok(())
    }

    /// Record by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn record(&self, index: usize) -> &FileRecord {
        &self.records[index]
    }

    /// All records in registration order.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// The mapped path store. Empty until finalized.
    #[must_use]
    pub fn region(&self) -> &PathRegion {
        &self.region
    }

    /// Path of a record. Empty until finalized.
    #[must_use]
    pub fn path_of(&self, record: &FileRecord) -> &Path {
        self.region.path(record.path_offset)
    }
}

#[cfg(unix)]
pub(crate) fn path_to_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    std::borrow::Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
pub(crate) fn path_to_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    match path.to_string_lossy() {
        std::borrow::Cow::Borrowed(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
        std::borrow::Cow::Owned(s) => std::borrow::Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> &Path {
    use std::os::unix::ffi::OsStrExt;
    Path::new(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> &Path {
    Path::new(std::str::from_utf8(bytes).unwrap_or_default())
}

//! Equivalence comparator over file records.
//!
//! # Overview
//!
//! [`Comparator`] orders two records so that they compare equal exactly when
//! they are duplicates under the active [`MatchCriteria`]. Metadata is checked
//! first, cheapest first, and content is hashed only when every enabled
//! metadata criterion ties:
//!
//! 1. size
//! 2. device (when distinguished)
//! 3. same device and inode: equal, or ordered by path with distinct hard links
//!    (only in [`Comparator::compare`]; [`Comparator::compare_class`] keeps them
//!    equal)
//! 4. mode, user, group, mtime, ctime (each when distinguished)
//! 5. partial hash of the leading bytes
//! 6. full hash, only when the partial hashes match and the file is longer
//!    than the partial window
//!
//! Digests are memoized on each record, so a file is hashed at most once per
//! kind however many comparisons it takes part in.

use std::cell::Cell;
use std::cmp::Ordering;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::store::{FileRecord, HashState, RecordStore};
use crate::progress::ProgressCallback;
use crate::scanner::{Hash, HashError, Hasher, PARTIAL_HASH_SIZE};

/// A single criterion that makes otherwise identical files distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Status-change time
    #[value(alias = "c")]
    #[serde(alias = "c")]
    Ctime,
    /// Device id
    #[value(alias = "d")]
    #[serde(alias = "d")]
    Device,
    /// Owning group
    #[value(alias = "g")]
    #[serde(alias = "g")]
    Group,
    /// Hard links to one inode are distinct files
    #[value(alias = "l")]
    #[serde(alias = "l")]
    Links,
    /// Modification time
    #[value(alias = "m")]
    #[serde(alias = "m")]
    Mtime,
    /// Permission bits
    #[value(alias = "p")]
    #[serde(alias = "p")]
    Mode,
    /// Owning user
    #[value(alias = "u")]
    #[serde(alias = "u")]
    User,
}

/// The set of criteria that distinguish files beyond their content.
///
/// Every flag defaults to off: by default two files are duplicates when their
/// contents match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriteria {
    /// Treat hard links to one inode as distinct files
    pub distinct_hardlinks: bool,
    /// Distinguish by status-change time
    pub ctime: bool,
    /// Distinguish by modification time
    pub mtime: bool,
    /// Distinguish by device
    pub device: bool,
    /// Distinguish by permission bits
    pub mode: bool,
    /// Distinguish by owning user
    pub user: bool,
    /// Distinguish by owning group
    pub group: bool,
}

impl MatchCriteria {
    /// Build criteria with the given flags enabled.
    #[must_use]
    pub fn from_criteria(criteria: &[Criterion]) -> Self {
        criteria
            .iter()
            .fold(Self::default(), |acc, &criterion| acc.with(criterion))
    }

    /// Enable one criterion.
    #[must_use]
    pub fn with(mut self, criterion: Criterion) -> Self {
        match criterion {
            Criterion::Ctime => self.ctime = true,
            Criterion::Device => self.device = true,
            Criterion::Group => self.group = true,
            Criterion::Links => self.distinct_hardlinks = true,
            Criterion::Mtime => self.mtime = true,
            Criterion::Mode => self.mode = true,
            Criterion::User => self.user = true,
        }
        self
    }

    /// The enabled criteria, in a fixed order.
    #[must_use]
    pub fn enabled(&self) -> Vec<Criterion> {
        [
            (self.ctime, Criterion::Ctime),
            (self.device, Criterion::Device),
            (self.group, Criterion::Group),
            (self.distinct_hardlinks, Criterion::Links),
            (self.mtime, Criterion::Mtime),
            (self.mode, Criterion::Mode),
            (self.user, Criterion::User),
        ]
        .into_iter()
        .filter_map(|(on, criterion)| on.then_some(criterion))
        .collect()
    }
}

/// Number of digests computed by a comparator.
#[derive(Debug, Default)]
pub struct HashCounters {
    partial: Cell<u64>,
    full: Cell<u64>,
}

impl HashCounters {
    /// Partial digests computed so far.
    #[must_use]
    pub fn partial(&self) -> u64 {
        self.partial.get()
    }

    /// Full digests computed so far.
    #[must_use]
    pub fn full(&self) -> u64 {
        self.full.get()
    }

    fn total(&self) -> u64 {
        self.partial() + self.full()
    }
}

/// Ordering over the records of one store.
pub struct Comparator<'a> {
    criteria: &'a MatchCriteria,
    store: &'a RecordStore,
    hasher: &'a Hasher,
    counters: &'a HashCounters,
    partial_size: u64,
    progress: Option<&'a dyn ProgressCallback>,
}

impl std::fmt::Debug for Comparator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator")
            .field("criteria", self.criteria)
            .field("partial_size", &self.partial_size)
            .field("progress", &self.progress.map(|_| "<callback>"))
            .finish_non_exhaustive()
    }
}

impl<'a> Comparator<'a> {
    /// Create a comparator over a finalized store.
    #[must_use]
    pub fn new(
        criteria: &'a MatchCriteria,
        store: &'a RecordStore,
        hasher: &'a Hasher,
        counters: &'a HashCounters,
    ) -> Self {
        Self {
            criteria,
            store,
            hasher,
            counters,
            partial_size: PARTIAL_HASH_SIZE,
            progress: None,
        }
    }

    /// Set the number of leading bytes covered by the partial hash.
    #[must_use]
    pub fn with_partial_size(mut self, size: u64) -> Self {
        self.partial_size = size.max(1);
        self
    }

    /// Report each computed digest to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Option<&'a dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Compare the records at two store indices.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if either file has to be hashed and cannot be read.
    pub fn compare_indices(&self, a: usize, b: usize) -> Result<Ordering, HashError> {
        self.compare(self.store.record(a), self.store.record(b))
    }

    /// Compare two records.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if either file has to be hashed and cannot be read.
    pub fn compare(&self, a: &FileRecord, b: &FileRecord) -> Result<Ordering, HashError> {
        let ordering = self.compare_class(a, b)?;
        if ordering.is_eq() && self.criteria.distinct_hardlinks && a.meta.same_file(&b.meta) {
            return Ok(self.path_order(a, b));
        }
        Ok(ordering)
    }

    /// Order two records by duplicate class.
    ///
    /// Names of one inode always share a class. Unlike [`compare`](Self::compare)
    /// this is a total preorder even with distinct hard links, so sorting by it
    /// leaves each class in one contiguous run.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if either file has to be hashed and cannot be read.
    pub fn compare_class(&self, a: &FileRecord, b: &FileRecord) -> Result<Ordering, HashError> {
        let (ma, mb) = (&a.meta, &b.meta);

        let by_size = ma.size.cmp(&mb.size);
        if by_size.is_ne() {
            return Ok(by_size);
        }

        if self.criteria.device {
            let by_device = ma.dev.cmp(&mb.dev);
            if by_device.is_ne() {
                return Ok(by_device);
            }
        }

        if ma.same_file(mb) {
            return Ok(Ordering::Equal);
        }

        let c = self.criteria;
        let by_meta = [
            (c.mode, ma.mode.cmp(&mb.mode)),
            (c.user, ma.uid.cmp(&mb.uid)),
            (c.group, ma.gid.cmp(&mb.gid)),
            (c.mtime, ma.mtime.cmp(&mb.mtime)),
            (c.ctime, ma.ctime.cmp(&mb.ctime)),
        ]
        .into_iter()
        .filter_map(|(on, ordering)| on.then_some(ordering))
        .find(|ordering| ordering.is_ne());
        if let Some(ordering) = by_meta {
            return Ok(ordering);
        }

        let by_partial = self.partial_hash(a)?.cmp(&self.partial_hash(b)?);
        if by_partial.is_ne() || ma.size <= self.partial_size {
            return Ok(by_partial);
        }

        Ok(self.full_hash(a)?.cmp(&self.full_hash(b)?))
    }

    /// Sort order: duplicate class, then path when hard links are distinct.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if either file has to be hashed and cannot be read.
    pub fn sort_order(&self, a: &FileRecord, b: &FileRecord) -> Result<Ordering, HashError> {
        let ordering = self.compare_class(a, b)?;
        if ordering.is_eq() && self.criteria.distinct_hardlinks {
            return Ok(self.path_order(a, b));
        }
        Ok(ordering)
    }

    fn path_order(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let region = self.store.region();
        region
            .path_bytes(a.path_offset)
            .cmp(region.path_bytes(b.path_offset))
    }

    fn partial_hash(&self, record: &FileRecord) -> Result<Hash, HashError> {
        if let Some(hash) = record.hash_state().partial() {
            return Ok(hash);
        }

        let path = self.store.path_of(record);
        let hash = self.hashed(path, |p| self.hasher.hash_prefix(p, self.partial_size))?;
        record.set_hash_state(HashState::Partial(hash));
        self.counters.partial.set(self.counters.partial() + 1);
        self.report(path);

        Ok(hash)
    }

    fn full_hash(&self, record: &FileRecord) -> Result<Hash, HashError> {
        if let Some(hash) = record.hash_state().full() {
            return Ok(hash);
        }

        let partial = self.partial_hash(record)?;
        let path = self.store.path_of(record);
        let full = self.hashed(path, |p| self.hasher.hash_prefix(p, record.meta.size))?;
        record.set_hash_state(HashState::Full { partial, full });
        self.counters.full.set(self.counters.full() + 1);
        self.report(path);

        Ok(full)
    }

    fn hashed(
        &self,
        path: &Path,
        hash: impl FnOnce(&Path) -> Result<Hash, HashError>,
    ) -> Result<Hash, HashError> {
        let before = self.hasher.bytes_read();
        let digest = hash(path).inspect_err(|e| log::debug!("Hashing failed: {e}"))?;
        if let Some(progress) = self.progress {
            progress.on_item_completed(self.hasher.bytes_read() - before);
        }
        log::trace!("Hashed {}", path.display());
        Ok(digest)
    }

    fn report(&self, path: &Path) {
        if let Some(progress) = self.progress {
            let current = usize::try_from(self.counters.total()).unwrap_or(usize::MAX);
            progress.on_progress(current, path.to_string_lossy().as_ref());
        }
    }
}

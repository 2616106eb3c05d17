//! Matching engine: registration, a single sort, and group iteration.
//!
//! # Overview
//!
//! The [`Matcher`] owns the record store. Files are registered one at a time
//! while the walk runs; [`Matcher::finalize`] then sorts a permutation of the
//! records once with the [`Comparator`](super::compare::Comparator), after
//! which each duplicate class sits in one contiguous run.
//!
//! When hard links are distinct, two names of one inode are not duplicates of
//! each other, yet both can be duplicates of a third copy. A run is therefore
//! reported whole as soon as it holds at least two inodes, and skipped when
//! every member is a name of the same inode.
//!
//! Groups are read with a two-call protocol:
//!
//! ```no_run
//! use dupelink::duplicates::{MatchCriteria, Matcher};
//! # fn main() -> Result<(), dupelink::duplicates::MatchError> {
//! let mut matcher = Matcher::new(MatchCriteria::default())?;
//! // ... register_file for each file ...
//! matcher.finalize()?;
//!
//! while let Some(original) = matcher.next_group()? {
//!     println!("{}", original.display());
//!     while let Some(duplicate) = matcher.next_file()? {
//!         println!("{}", duplicate.display());
//!     }
//!     println!();
//! }
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::compare::{Comparator, HashCounters, MatchCriteria};
use super::sort::try_sort_by;
use super::store::{RecordId, RecordStore, StoreError};
use crate::progress::ProgressCallback;
use crate::scanner::{FileMeta, HashError, Hasher, PARTIAL_HASH_SIZE};

/// Errors raised by the matching engine.
#[derive(Debug, Error)]
pub enum MatchError {
    /// `finalize` was called a second time.
    #[error("matcher is already finalized")]
    AlreadyFinalized,

    /// Groups were requested before `finalize`.
    #[error("matcher is not finalized")]
    NotFinalized,

    /// A previous finalize failed and left no usable order.
    #[error("matcher is unusable after a failed finalize")]
    Failed,

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A file could not be hashed during comparison.
    #[error("cannot compare files: {0}")]
    Hash(#[from] HashError),
}

/// Counters describing how much work matching cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    /// Number of files registered
    pub files: usize,
    /// Partial digests computed
    pub partial_hashes: u64,
    /// Full digests computed
    pub full_hashes: u64,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Collecting,
    Finalized,
    Failed,
}

/// Duplicate detector over a set of registered files.
pub struct Matcher {
    store: RecordStore,
    criteria: MatchCriteria,
    hasher: Hasher,
    counters: HashCounters,
    partial_hash_size: u64,
    progress: Option<Arc<dyn ProgressCallback>>,
    state: State,
    /// Record indices in sorted order
    order: Vec<usize>,
    /// Position in `order` of the current record
    cursor: usize,
    /// End (exclusive) of the open group in `order`, if any
    group_end: Option<usize>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("files", &self.store.count())
            .field("criteria", &self.criteria)
            .field("partial_hash_size", &self.partial_hash_size)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Matcher {
    /// Create an empty matcher.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Store`] if temporary storage cannot be created.
    pub fn new(criteria: MatchCriteria) -> Result<Self, MatchError> {
        Ok(Self {
            store: RecordStore::new()?,
            criteria,
            hasher: Hasher::new(),
            counters: HashCounters::default(),
            partial_hash_size: PARTIAL_HASH_SIZE,
            progress: None,
            state: State::Collecting,
            order: Vec::new(),
            cursor: 0,
            group_end: None,
        })
    }

    /// Set the number of leading bytes covered by the partial hash.
    #[must_use]
    pub fn with_partial_hash_size(mut self, size: u64) -> Self {
        self.partial_hash_size = size.max(1);
        self
    }

    /// Report hashing progress during finalize and iteration.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The active criteria.
    #[must_use]
    pub fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }

    /// Register one regular file.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::AlreadyFinalized`] after finalize, or
    /// [`MatchError::Store`] if the path cannot be stored. A failed
    /// registration affects only this file.
    pub fn register_file(&mut self, path: &Path, meta: FileMeta) -> Result<RecordId, MatchError> {
        if self.state != State::Collecting {
            return Err(MatchError::AlreadyFinalized);
        }
        Ok(self.store.register(path, meta)?)
    }

    /// Number of files registered.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.store.count()
    }

    /// Whether [`finalize`](Self::finalize) completed.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    /// Sort the registered files so that duplicates are adjacent.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::AlreadyFinalized`] on a second call,
    /// [`MatchError::Store`] if the path store cannot be mapped, or
    /// [`MatchError::Hash`] if a file cannot be hashed. After an error the
    /// matcher refuses further use.
    pub fn finalize(&mut self) -> Result<(), MatchError> {
        match self.state {
            State::Collecting => {}
            State::Finalized => return Err(MatchError::AlreadyFinalized),
            State::Failed => return Err(MatchError::Failed),
        }

        self.state = State::Failed;
        self.store.finalize()?;

        let mut order: Vec<usize> = (0..self.store.count()).collect();
        if order.len() > 1 {
            log::debug!("Sorting {} files", order.len());
            if let Some(ref progress) = self.progress {
                progress.on_phase_start("matching", order.len());
            }

            let comparator = self.comparator();
            try_sort_by(&mut order, |&a, &b| {
                comparator.sort_order(self.store.record(a), self.store.record(b))
            })?;

            if let Some(ref progress) = self.progress {
                progress.on_phase_end("matching");
            }
        }

        self.order = order;
        self.cursor = 0;
        self.group_end = None;
        self.state = State::Finalized;

        let stats = self.stats();
        log::debug!(
            "Finalized {} files: {} partial hashes, {} full hashes, {} bytes read",
            stats.files,
            stats.partial_hashes,
            stats.full_hashes,
            stats.bytes_hashed
        );
        Ok(())
    }

    /// Advance to the next duplicate group and return its first member.
    ///
    /// The cursor stays on the returned record; call
    /// [`next_file`](Self::next_file) until it returns `None` to read the
    /// remaining members. Members of a group left undrained are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotFinalized`] before finalize, or
    /// [`MatchError::Hash`] if a file cannot be hashed.
    pub fn next_group(&mut self) -> Result<Option<PathBuf>, MatchError> {
        self.ensure_finalized()?;

        if let Some(end) = self.group_end.take() {
            self.cursor = end;
        }

        while self.cursor < self.order.len() {
            let end = self.run_end(self.cursor)?;
            if self.is_group(self.cursor, end) {
                self.group_end = Some(end);
                return Ok(Some(self.path_at(self.cursor)));
            }
            self.cursor = end;
        }

        Ok(None)
    }

    /// Return the next member of the current group, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotFinalized`] before finalize.
    pub fn next_file(&mut self) -> Result<Option<PathBuf>, MatchError> {
        self.ensure_finalized()?;

        match self.group_end {
            Some(end) if self.cursor + 1 < end => {
                self.cursor += 1;
                Ok(Some(self.path_at(self.cursor)))
            }
            _ => Ok(None),
        }
    }

    /// Paths of every registered file in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotFinalized`] before finalize.
    pub fn sorted_paths(&self) -> Result<Vec<PathBuf>, MatchError> {
        self.ensure_finalized()?;
        Ok((0..self.order.len()).map(|i| self.path_at(i)).collect())
    }

    /// Size in bytes of the record at the cursor.
    pub(crate) fn current_size(&self) -> Option<u64> {
        self.order
            .get(self.cursor)
            .map(|&index| self.store.record(index).meta.size)
    }

    /// Hashing work done so far.
    #[must_use]
    pub fn stats(&self) -> MatchStats {
        MatchStats {
            files: self.store.count(),
            partial_hashes: self.counters.partial(),
            full_hashes: self.counters.full(),
            bytes_hashed: self.hasher.bytes_read(),
        }
    }

    fn comparator(&self) -> Comparator<'_> {
        Comparator::new(&self.criteria, &self.store, &self.hasher, &self.counters)
            .with_partial_size(self.partial_hash_size)
            .with_progress(self.progress.as_deref())
    }

    fn ensure_finalized(&self) -> Result<(), MatchError> {
        match self.state {
            State::Finalized => Ok(()),
            State::Collecting => Err(MatchError::NotFinalized),
            State::Failed => Err(MatchError::Failed),
        }
    }

    /// End (exclusive) of the duplicate class starting at `start`.
    fn run_end(&self, start: usize) -> Result<usize, MatchError> {
        let comparator = self.comparator();
        let mut end = start + 1;
        while end < self.order.len() {
            let (a, b) = (self.order[end - 1], self.order[end]);
            let ordering =
                comparator.compare_class(self.store.record(a), self.store.record(b))?;
            if ordering != Ordering::Equal {
                break;
            }
            end += 1;
        }
        Ok(end)
    }

    fn is_group(&self, start: usize, end: usize) -> bool {
        if end - start < 2 {
            return false;
        }
        if !self.criteria.distinct_hardlinks {
            return true;
        }
        let first = &self.store.record(self.order[start]).meta;
        self.order[start + 1..end]
            .iter()
            .any(|&index| !self.store.record(index).meta.same_file(first))
    }

    fn path_at(&self, position: usize) -> PathBuf {
        let record = self.store.record(self.order[position]);
        self.store.path_of(record).to_path_buf()
    }
}

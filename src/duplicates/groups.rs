//! Duplicate groups read from a finalized matcher.
//!
//! # Overview
//!
//! [`Matcher::groups`] wraps the `next_group`/`next_file` protocol in an
//! iterator of owned [`DuplicateGroup`] values. The first member of each
//! group is its original; every other member is a duplicate of it.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::duplicates::{MatchCriteria, Matcher};
//! # fn main() -> Result<(), dupelink::duplicates::MatchError> {
//! let mut matcher = Matcher::new(MatchCriteria::default())?;
//! matcher.finalize()?;
//!
//! for group in matcher.groups() {
//!     let group = group?;
//!     if let Some(original) = group.original() {
//!         println!("{} copies of {}", group.len(), original.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::matcher::{MatchError, Matcher};

/// A maximal set of two or more files of one duplicate class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// File size in bytes, shared by every member
    pub size: u64,
    /// Member paths, original first
    pub files: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(size: u64, files: Vec<PathBuf>) -> Self {
        Self { size, files }
    }

    /// The member every other member is linked to, or `None` for an empty
    /// group.
    #[must_use]
    pub fn original(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    /// Every member after the original.
    #[must_use]
    pub fn duplicates(&self) -> &[PathBuf] {
        self.files.get(1..).unwrap_or_default()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bytes held by the duplicates (all copies minus one).
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicates().len() as u64
    }
}

/// Iterator over the duplicate groups of a finalized matcher.
///
/// Yields at most one error, then stops.
#[derive(Debug)]
pub struct Groups<'a> {
    matcher: &'a mut Matcher,
    done: bool,
}

impl Groups<'_> {
    fn read_group(&mut self) -> Result<Option<DuplicateGroup>, MatchError> {
        let Some(original) = self.matcher.next_group()? else {
            return Ok(None);
        };
        let size = self.matcher.current_size().unwrap_or_default();

        let mut files = vec![original];
        while let Some(duplicate) = self.matcher.next_file()? {
            files.push(duplicate);
        }

        Ok(Some(DuplicateGroup::new(size, files)))
    }
}

impl Iterator for Groups<'_> {
    type Item = Result<DuplicateGroup, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.read_group();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result.transpose()
    }
}

impl std::iter::FusedIterator for Groups<'_> {}

impl Matcher {
    /// Iterate over the remaining duplicate groups.
    pub fn groups(&mut self) -> Groups<'_> {
        Groups {
            matcher: self,
            done: false,
        }
    }
}

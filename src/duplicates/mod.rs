//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Spooling registered files to a compact record store
//! - Ordering records by metadata and lazily computed content hashes
//! - Sorting once and reading adjacent equal records as duplicate groups
//!
//! # Architecture
//!
//! - [`store`]: append-only path store and file records
//! - [`compare`]: the equivalence comparator and its criteria
//! - [`sort`]: a stable merge sort that accepts a fallible comparator
//! - [`matcher`]: the matching engine and its group iteration protocol
//! - [`groups`]: owned duplicate groups and an iterator over them

pub mod compare;
pub mod groups;
pub mod matcher;
pub mod sort;
pub mod store;

pub use compare::{Comparator, Criterion, HashCounters, MatchCriteria};
pub use groups::{DuplicateGroup, Groups};
pub use matcher::{MatchError, MatchStats, Matcher};
pub use sort::try_sort_by;
pub use store::{FileRecord, HashState, RecordId, RecordStore, StoreError};

//! Report writers for duplicate groups.
//!
//! This module provides the two formats of the `list` subcommand:
//! - Plain text, streamed group by group, for shells and pipes
//! - JSON, with a run summary, for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use dupelink::duplicates::{MatchCriteria, Matcher};
//! use dupelink::output::TextOutput;
//!
//! let mut matcher = Matcher::new(MatchCriteria::default()).unwrap();
//! // register files...
//! matcher.finalize().unwrap();
//!
//! let mut out = TextOutput::new(std::io::stdout().lock());
//! for group in matcher.groups() {
//!     out.write_group(&group.unwrap()).unwrap();
//! }
//! ```

pub mod json;
pub mod text;

use std::time::Duration;

use crate::duplicates::{DuplicateGroup, MatchStats};

// Re-export main types
pub use json::JsonOutput;
pub use text::TextOutput;

/// Totals gathered over one run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Files registered with the matcher
    pub total_files: usize,
    /// Groups of two or more equal files
    pub duplicate_groups: usize,
    /// Members of those groups other than the originals
    pub duplicate_files: usize,
    /// Bytes freed if every duplicate were linked
    pub reclaimable_space: u64,
    /// Hashing work done by the matcher
    pub stats: MatchStats,
    /// Walk errors and rejected registrations
    pub scan_errors: usize,
    /// Wall time of the whole run
    pub scan_duration: Duration,
    /// Whether the run was cut short
    pub interrupted: bool,
}

impl ScanSummary {
    /// Account for one reported group.
    pub fn record_group(&mut self, group: &DuplicateGroup) {
        self.duplicate_groups += 1;
        self.duplicate_files += group.duplicates().len();
        self.reclaimable_space += group.wasted_space();
    }
}

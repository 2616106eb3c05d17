//! Plain text report.
//!
//! Each group is written as its member paths, one per line, original first.
//! Groups are separated by a single blank line. Paths are written as their
//! raw bytes, so names that are not valid UTF-8 survive a round trip through
//! a pipe.
//!
//! ```text
//! /music/a.flac
//! /backup/a.flac
//!
//! /music/b.flac
//! /backup/b.flac
//! /backup/old/b.flac
//! ```

use std::io::{self, Write};

use crate::duplicates::store::path_to_bytes;
use crate::duplicates::DuplicateGroup;

/// Streaming writer for the text report.
#[derive(Debug)]
pub struct TextOutput<W: Write> {
    writer: W,
    groups_written: usize,
}

impl<W: Write> TextOutput<W> {
    /// Create a writer over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            groups_written: 0,
        }
    }

    /// Write one group.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn write_group(&mut self, group: &DuplicateGroup) -> io::Result<()> {
        if self.groups_written > 0 {
            self.writer.write_all(b"\n")?;
        }
        for path in &group.files {
            self.writer.write_all(&path_to_bytes(path))?;
            self.writer.write_all(b"\n")?;
        }
        self.groups_written += 1;
        Ok(())
    }

    /// Number of groups written so far.
    #[must_use]
    pub fn groups_written(&self) -> usize {
        self.groups_written
    }

    /// Flush and return the inner writer.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

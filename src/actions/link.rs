//! Replace duplicate files with links to their original.
//!
//! # Overview
//!
//! For each duplicate `D` of an original `O`, [`link_file`]:
//!
//! 1. Re-reads the live metadata of `D` (it may have changed since the scan)
//! 2. Creates the link at a fresh temporary name in `D`'s directory
//! 3. Copies `D`'s timestamps, owner and permission bits onto the new link
//! 4. Renames the temporary name over `D` in a single step
//!
//! Observers therefore see either the old `D` or the finished link, never a
//! missing path. The temporary name is removed on every failure path.
//!
//! # Preservation policy
//!
//! With [`LinkConfig::strict`] off, failing to preserve a timestamp, the
//! owner or the mode only logs a warning. With it on, the first such failure
//! abandons that link and leaves `D` untouched.
//!
//! # Example
//!
//! ```no_run
//! use dupelink::actions::link::{link_file, LinkConfig, LinkKind};
//! use std::path::Path;
//!
//! let outcome = link_file(
//!     Path::new("/photos/a.jpg"),
//!     Path::new("/backup/a.jpg"),
//!     &LinkKind::Hard,
//!     &LinkConfig::default(),
//! );
//! println!("{:?}", outcome);
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clone::clone_file;
use crate::duplicates::{DuplicateGroup, MatchError};
use crate::scanner::FileMeta;

/// Prefix of the temporary names created next to each duplicate.
pub const TEMP_PREFIX: &str = ".dupelink.";

/// The kind of link that replaces a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// A hard link to the original's inode
    #[default]
    Hard,
    /// A symbolic link to the original's absolute path
    #[value(alias = "soft")]
    Symbolic,
    /// A copy-on-write clone of the original
    #[value(alias = "reflink")]
    Clone,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "hard"),
            Self::Symbolic => write!(f, "symbolic"),
            Self::Clone => write!(f, "clone"),
        }
    }
}

/// An operation that creates `target` as a link to `original`.
pub trait LinkOperation {
    /// Kind of link produced. Symbolic links skip mode and owner updates.
    fn kind(&self) -> LinkKind;

    /// Create `target`, which must not exist yet.
    ///
    /// An [`io::ErrorKind::AlreadyExists`] error makes the caller retry with
    /// another temporary name.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn link(&self, original: &Path, target: &Path) -> io::Result<()>;
}

impl LinkOperation for LinkKind {
    fn kind(&self) -> LinkKind {
        *self
    }

    fn link(&self, original: &Path, target: &Path) -> io::Result<()> {
        match self {
            Self::Hard => fs::hard_link(original, target),
            Self::Symbolic => symlink(&std::path::absolute(original)?, target),
            Self::Clone => clone_file(original, target).map_err(io::Error::from),
        }
    }
}

#[cfg(unix)]
fn symlink(original: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, target)
}

#[cfg(windows)]
fn symlink(original: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, target)
}

/// Error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The original or the duplicate could not be examined.
    #[error("cannot examine {path}: {source}")]
    Snapshot {
        /// Path being examined
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The link could not be created next to the duplicate.
    #[error("cannot create {kind} link for {path}: {source}")]
    Create {
        /// Duplicate being replaced
        path: PathBuf,
        /// Kind of link attempted
        kind: LinkKind,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An attribute of the duplicate could not be carried over (strict mode).
    #[error("cannot preserve {attribute} of {path}: {source}")]
    Preserve {
        /// Attribute that failed: "timestamps", "owner" or "mode"
        attribute: &'static str,
        /// Duplicate being replaced
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The finished link could not be renamed over the duplicate.
    #[error("cannot replace {path}: {source}")]
    Rename {
        /// Duplicate being replaced
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Snapshot { path, .. }
            | Self::Create { path, .. }
            | Self::Preserve { path, .. }
            | Self::Rename { path, .. } => path,
        }
    }
}

/// Result of a successful [`link_file`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The duplicate was replaced by a link.
    Linked,
    /// The duplicate already was the original's inode; nothing changed.
    AlreadyLinked,
}

/// Configuration for link operations.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Abort a link on the first attribute that cannot be preserved.
    pub strict: bool,
    /// Keep processing groups after a failed link.
    pub continue_on_error: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            strict: false,
            continue_on_error: true,
        }
    }
}

impl LinkConfig {
    /// Enable/disable strict preservation.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable/disable continue on error.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Live attributes of a duplicate, captured just before it is replaced.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    meta: FileMeta,
    atime: FileTime,
    mtime: FileTime,
}

impl Snapshot {
    fn capture(path: &Path) -> Result<Self, LinkError> {
        let metadata = fs::symlink_metadata(path).map_err(|source| LinkError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            meta: FileMeta::from_metadata(&metadata),
            atime: FileTime::from_last_access_time(&metadata),
            mtime: FileTime::from_last_modification_time(&metadata),
        })
    }
}

/// Replace `duplicate` with a link to `original` produced by `op`.
///
/// # Errors
///
/// Returns [`LinkError`] if either file cannot be examined, the link cannot
/// be created or renamed into place, or (in strict mode) an attribute cannot
/// be preserved. On error `duplicate` is unchanged.
pub fn link_file<O>(
    original: &Path,
    duplicate: &Path,
    op: &O,
    config: &LinkConfig,
) -> Result<LinkOutcome, LinkError>
where
    O: LinkOperation + ?Sized,
{
    let snapshot = Snapshot::capture(duplicate)?;
    let original_meta = FileMeta::read(original).map_err(|source| LinkError::Snapshot {
        path: original.to_path_buf(),
        source,
    })?;

    if original_meta.same_file(&snapshot.meta) {
        log::debug!(
            "Already linked: {} -> {}",
            duplicate.display(),
            original.display()
        );
        return Ok(LinkOutcome::AlreadyLinked);
    }

    let kind = op.kind();
    let dir = match duplicate.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .make_in(dir, |path| op.link(original, path))
        .map_err(|source| LinkError::Create {
            path: duplicate.to_path_buf(),
            kind,
            source,
        })?;
    log::trace!("Created temporary link {}", temp.path().display());

    preserve_attributes(temp.path(), duplicate, kind, &snapshot, config)?;

    temp.persist(duplicate).map_err(|e| LinkError::Rename {
        path: duplicate.to_path_buf(),
        source: e.error,
    })?;

    log::debug!(
        "Linked ({}): {} -> {}",
        kind,
        duplicate.display(),
        original.display()
    );
    Ok(LinkOutcome::Linked)
}

fn preserve_attributes(
    link: &Path,
    duplicate: &Path,
    kind: LinkKind,
    snapshot: &Snapshot,
    config: &LinkConfig,
) -> Result<(), LinkError> {
    let check = |attribute: &'static str, result: io::Result<()>, strict: bool| match result {
        Ok(()) => Ok(()),
        Err(source) if strict => Err(LinkError::Preserve {
            attribute,
            path: duplicate.to_path_buf(),
            source,
        }),
        Err(e) => {
            log::warn!(
                "Could not preserve {} of {}: {}",
                attribute,
                duplicate.display(),
                e
            );
            Ok(())
        }
    };

    let times = filetime::set_symlink_file_times(link, snapshot.atime, snapshot.mtime);
    check("timestamps", times, config.strict && kind != LinkKind::Symbolic)?;

    if kind == LinkKind::Symbolic {
        return Ok(());
    }

    check("owner", set_owner(link, &snapshot.meta), config.strict)?;
    check("mode", set_mode(link, &snapshot.meta), config.strict)?;

    Ok(())
}

#[cfg(unix)]
fn set_owner(path: &Path, meta: &FileMeta) -> io::Result<()> {
    std::os::unix::fs::chown(path, Some(meta.uid), Some(meta.gid))
}

#[cfg(not(unix))]
fn set_owner(_path: &Path, _meta: &FileMeta) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, meta: &FileMeta) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(meta.mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _meta: &FileMeta) -> io::Result<()> {
    Ok(())
}

/// Results of a batch link operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchLinkResult {
    /// Duplicate groups processed.
    pub groups: usize,
    /// Duplicates replaced by a link.
    pub links_made: usize,
    /// Duplicates that already were the original's inode.
    pub already_linked: usize,
    /// Bytes no longer stored twice.
    pub bytes_saved: u64,
    /// Failed links with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Whether the batch stopped on a shutdown request.
    pub interrupted: bool,
}

impl BatchLinkResult {
    /// Number of failed links.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if every link succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Processed {} group(s): {} link(s) made, {} already linked, {} saved",
            self.groups,
            self.links_made,
            self.already_linked,
            bytesize::ByteSize(self.bytes_saved)
        );
        if !self.all_succeeded() {
            summary.push_str(&format!(", {} failed", self.failure_count()));
        }
        if self.interrupted {
            summary.push_str(" (interrupted)");
        }
        summary
    }
}

/// Callback trait for link progress reporting.
pub trait LinkProgressCallback: Send + Sync {
    /// Called before the duplicates of a group are linked.
    fn on_group(&self, original: &Path, index: usize);

    /// Called after a duplicate was linked or found already linked.
    fn on_link_success(&self, duplicate: &Path, outcome: LinkOutcome);

    /// Called after a failed link.
    fn on_link_failure(&self, duplicate: &Path, error: &str);

    /// Called when the batch completes.
    fn on_complete(&self, result: &BatchLinkResult);
}

/// Link every duplicate of every group to the group's original.
///
/// Link errors are recorded in the result; with
/// [`LinkConfig::continue_on_error`] off the batch stops at the first one.
/// The shutdown flag is checked between groups.
///
/// # Errors
///
/// Returns the first [`MatchError`] produced by `groups`.
pub fn link_duplicates<I, O, C>(
    groups: I,
    op: &O,
    config: &LinkConfig,
    callback: Option<&C>,
    shutdown: Option<&AtomicBool>,
) -> Result<BatchLinkResult, MatchError>
where
    I: IntoIterator<Item = Result<DuplicateGroup, MatchError>>,
    O: LinkOperation + ?Sized,
    C: LinkProgressCallback + ?Sized,
{
    let mut result = BatchLinkResult::default();

    'groups: for group in groups {
        if shutdown.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            log::info!("Linking interrupted after {} group(s)", result.groups);
            result.interrupted = true;
            break;
        }

        let group = group?;
        let Some(original) = group.original() else {
            continue;
        };
        if let Some(cb) = callback {
            cb.on_group(original, result.groups);
        }
        result.groups += 1;

        for duplicate in group.duplicates() {
            match link_file(original, duplicate, op, config) {
                Ok(outcome) => {
                    match outcome {
                        LinkOutcome::Linked => {
                            result.links_made += 1;
                            result.bytes_saved += group.size;
                        }
                        LinkOutcome::AlreadyLinked => result.already_linked += 1,
                    }
                    if let Some(cb) = callback {
                        cb.on_link_success(duplicate, outcome);
                    }
                }
                Err(e) => {
                    let error_msg = e.to_string();
                    log::warn!("{}", error_msg);

                    if let Some(cb) = callback {
                        cb.on_link_failure(duplicate, &error_msg);
                    }
                    result.failures.push((duplicate.clone(), error_msg));

                    if !config.continue_on_error {
                        log::info!("Stopping batch link due to error (continue_on_error=false)");
                        break 'groups;
                    }
                }
            }
        }
    }

    if let Some(cb) = callback {
        cb.on_complete(&result);
    }

    log::info!("{}", result.summary());

    Ok(result)
}

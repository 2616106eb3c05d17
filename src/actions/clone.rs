//! Copy-on-write file clones.
//!
//! On Linux a clone is made with the `FICLONE` ioctl, which shares the
//! source's data blocks with a new file until either side is written. Btrfs,
//! XFS and a few other filesystems support it; everywhere else the call fails
//! with [`CloneError::Unsupported`].

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for clone operations.
#[derive(Debug, Error)]
pub enum CloneError {
    /// The filesystem or platform cannot clone files.
    #[error("copy-on-write clones are not supported for {0}")]
    Unsupported(PathBuf),

    /// Source and target live on different filesystems.
    #[error("cannot clone {source_path} across devices to {target}")]
    CrossDevice {
        /// File being cloned
        source_path: PathBuf,
        /// Path of the would-be clone
        target: PathBuf,
    },

    /// The source cannot be cloned (not a regular file, or refused by the
    /// filesystem).
    #[error("{0} is not eligible for cloning")]
    NotEligible(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl CloneError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<CloneError> for io::Error {
    fn from(error: CloneError) -> Self {
        match error {
            CloneError::Io { source, .. } => source,
            CloneError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, error),
            other => io::Error::other(other),
        }
    }
}

/// Create `target` as a copy-on-write clone of `source`.
///
/// `target` must not exist. If cloning fails after `target` was created, it
/// is removed again.
///
/// # Errors
///
/// Returns [`CloneError`] describing why the clone could not be made.
#[cfg(target_os = "linux")]
pub fn clone_file(source: &Path, target: &Path) -> Result<(), CloneError> {
    use std::os::unix::fs::MetadataExt;
    use std::os::unix::io::AsRawFd;

    let src = File::open(source).map_err(|e| CloneError::io(source, e))?;
    let src_meta = src.metadata().map_err(|e| CloneError::io(source, e))?;
    if !src_meta.is_file() {
        return Err(CloneError::NotEligible(source.to_path_buf()));
    }

    let dst = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|e| CloneError::io(target, e))?;

    let result = dst
        .metadata()
        .map_err(|e| CloneError::io(target, e))
        .and_then(|dst_meta| {
            if dst_meta.dev() != src_meta.dev() {
                return Err(CloneError::CrossDevice {
                    source_path: source.to_path_buf(),
                    target: target.to_path_buf(),
                });
            }

            // SAFETY: both descriptors are open for the duration of the call
            // and FICLONE takes the source descriptor by value.
            let ret = unsafe { libc::ioctl(dst.as_raw_fd(), libc::FICLONE, src.as_raw_fd()) };
            if ret == -1 {
                return Err(classify(source, target, io::Error::last_os_error()));
            }
            Ok(())
        });

    if result.is_err() {
        drop(dst);
        if let Err(e) = fs::remove_file(target) {
            log::warn!("Failed to remove partial clone {}: {}", target.display(), e);
        }
    }
    result
}

/// Create `target` as a copy-on-write clone of `source`.
///
/// # Errors
///
/// Always returns [`CloneError::Unsupported`] on this platform.
#[cfg(not(target_os = "linux"))]
pub fn clone_file(source: &Path, _target: &Path) -> Result<(), CloneError> {
    Err(CloneError::Unsupported(source.to_path_buf()))
}

#[cfg(target_os = "linux")]
fn classify(source: &Path, target: &Path, error: io::Error) -> CloneError {
    match error.raw_os_error() {
        Some(libc::EOPNOTSUPP | libc::ENOTTY | libc::ENOSYS) => {
            CloneError::Unsupported(target.to_path_buf())
        }
        Some(libc::EXDEV) => CloneError::CrossDevice {
            source_path: source.to_path_buf(),
            target: target.to_path_buf(),
        },
        Some(libc::EINVAL | libc::EISDIR | libc::EPERM | libc::ETXTBSY) => {
            CloneError::NotEligible(source.to_path_buf())
        }
        _ => CloneError::io(target, error),
    }
}

//! File actions module.
//!
//! This module provides functionality for:
//! - Replacing duplicates with hard links, symbolic links or clones
//! - Copy-on-write cloning via the Linux `FICLONE` ioctl
//!
//! # Linking
//!
//! Every replacement is atomic: the link is built under a temporary name next
//! to the duplicate, given the duplicate's attributes, then renamed over it.
//!
//! ```no_run
//! use dupelink::actions::link::{link_file, LinkConfig, LinkKind};
//! use std::path::Path;
//!
//! let result = link_file(
//!     Path::new("original.txt"),
//!     Path::new("copy.txt"),
//!     &LinkKind::Symbolic,
//!     &LinkConfig::default(),
//! );
//! ```

pub mod clone;
pub mod link;

// Re-export commonly used types
pub use clone::{clone_file, CloneError};
pub use link::{
    link_duplicates, link_file, BatchLinkResult, LinkConfig, LinkError, LinkKind, LinkOperation,
    LinkOutcome, LinkProgressCallback,
};

//! Core types, errors, and path utilities for the bvfs catalog browser.
//!
//! This crate defines the shared error type ([`BvfsError`]), the row types
//! emitted to listing sinks ([`DirEntry`], [`FileEntry`], [`VersionEntry`]),
//! comma-separated id-list parsing, parent/basename path arithmetic, and the
//! cooperative [`CancelToken`] checked at catalog round-trip boundaries.
//!
//! It has minimal external dependencies and is depended on by every other
//! crate in the workspace.

pub mod cancel;
pub mod error;
pub mod id_list;
pub mod path;
pub mod tracing_config;
pub mod types;

pub use cancel::CancelToken;
pub use error::{BvfsError, BvfsResult};
pub use id_list::{IdList, MAX_ID_DIGITS, parse_id_list, parse_id_pairs};
pub use path::{basename_dir, parent_dir};
pub use types::{DirEntry, FileEntry, FileId, JobId, JobType, PathId, VersionEntry};

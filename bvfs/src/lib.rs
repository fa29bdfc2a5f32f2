//! # bvfs
//!
//! Browse completed backup jobs as a filesystem.
//!
//! A backup catalog stores files flat: one `File` row per captured file,
//! keyed by `(JobId, PathId, Name)`. bvfs projects that onto a directory
//! tree so operators can walk it, search it, inspect file versions across
//! jobs, and assemble a restore selection, all without touching backup
//! storage. Directory structure is computed lazily, once per job, into two
//! catalog-side cache tables:
//!
//! - `PathHierarchy`: parent edges (`PathId -> PPathId`) over the flat
//!   path set, built by climbing each path to its first known ancestor.
//! - `PathVisibility`: which paths are reachable from which job, taken to
//!   its upward closure so every ancestor of a captured file is browsable.
//!
//! The per-job computation is guarded by the `Job.HasCache` flag
//! (`0` none, `-1` in progress, `1` ready), so concurrent refreshers
//! never double-build and a crashed refresh is detectable.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::ops::ControlFlow;
//! use std::sync::Arc;
//!
//! use bvfs::{BvfsSession, update_cache};
//! use bvfs_catalog::{Catalog, CatalogConfig};
//! use bvfs_core::CancelToken;
//!
//! let catalog = Arc::new(Catalog::open(CatalogConfig::default())?);
//! update_cache(&catalog, &CancelToken::new())?;
//!
//! let mut session = BvfsSession::new(Arc::clone(&catalog));
//! session.set_job_ids("12,15")?;
//! session.ch_dir("/home/")?;
//! session.ls_dirs(&mut |dir| {
//!     println!("{}", dir.path);
//!     ControlFlow::Continue(())
//! })?;
//!
//! // Restore everything under the current directory from those jobs.
//! let pwd = session.pwd_id().to_string();
//! session.compute_restore_list("", &pwd, "", "b2100")?;
//! ```
//!
//! ## Crate layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `bvfs-core` | Errors, row types, id-list parsing, path arithmetic |
//! | `bvfs-catalog` | Catalog session, dialect routing, schema bootstrap |
//! | `bvfs` (this crate) | Hierarchy cache, listers, restore compiler |

pub mod cache;
pub mod hierarchy;
pub mod maintenance;
pub mod session;

mod ls_dirs;
mod ls_files;
mod restore;
#[cfg(test)]
mod testutil;
mod versions;

pub use cache::PathIdCache;
pub use hierarchy::{RefreshOutcome, update_path_hierarchy_cache};
pub use maintenance::{
    MaintenanceSummary, clear_cache, update_cache, update_cache_for_job_ids,
    update_cache_for_jobs,
};
pub use session::{BvfsSession, DEFAULT_LIMIT};

pub use bvfs_core::{
    BvfsError, BvfsResult, CancelToken, DirEntry, FileEntry, FileId, JobId, JobType, PathId,
    VersionEntry,
};

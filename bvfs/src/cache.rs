//! Process-local memoisation of already-hierarchised `PathId`s.

use std::collections::HashSet;

use bvfs_core::PathId;

// Sized for a large job's worth of unique directories so the hot refresh
// loop does not rehash mid-batch.
const INITIAL_CAPACITY: usize = 50_000;

/// Positive-only memo of `PathId`s known to have a `PathHierarchy` row.
///
/// A hit means the row existed in the catalog the moment it was inserted
/// here; a miss means nothing and the caller must probe the catalog. One
/// instance lives for exactly one maintenance batch and is never shared
/// across threads, so membership can only grow stale by deletion, which
/// only `clear_cache` does (and that discards the batch too).
#[derive(Debug)]
pub struct PathIdCache {
    seen: HashSet<PathId>,
}

impl PathIdCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: HashSet::with_capacity(INITIAL_CAPACITY),
        }
    }

    #[must_use]
    pub fn contains(&self, path_id: PathId) -> bool {
        self.seen.contains(&path_id)
    }

    pub fn insert(&mut self, path_id: PathId) {
        self.seen.insert(path_id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for PathIdCache {
    fn default() -> Self {
        Self::new()
    }
}

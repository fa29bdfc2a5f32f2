//! Path-hierarchy materialisation and the per-job visibility refresh.
//!
//! The catalog stores files against flat `(PathId, Name)` rows; browsing
//! needs parent/child edges (`PathHierarchy`) and per-job reachability
//! (`PathVisibility`). Both are computed lazily, once per job, guarded by
//! the `Job.HasCache` state machine:
//!
//! ```text
//!   0 --(claim)--> -1 --(finish)--> 1
//!   1 --(noop)--> 1
//!  -1 --(noop, busy)--> -1
//! ```
//!
//! The claim transaction commits before any hierarchy row is written.
//! That publication is load-bearing: a concurrent refresher either
//! observes the `-1` and yields, or publishes its own `-1` first, so two
//! sessions never race an insert on the same `PathHierarchy` key.

use bvfs_catalog::{Catalog, create_path_record, row_i64, row_text};
use bvfs_core::{BvfsError, BvfsResult, CancelToken, JobId, PathId, parent_dir};
use fsqlite::Connection;
use fsqlite_types::value::SqliteValue;

use crate::cache::PathIdCache;

/// Outcome of a per-job cache refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This invocation did the work and published `HasCache = 1`.
    Refreshed,
    /// The job was already cached; nothing to do.
    AlreadyCached,
    /// Another session owns the in-progress claim; nothing to do.
    Busy,
}

impl RefreshOutcome {
    /// Turn `Busy` into [`BvfsError::Busy`] for callers that asked for one
    /// specific job and want the contention surfaced instead of swallowed.
    pub fn require_progress(self, job_id: JobId) -> BvfsResult<Self> {
        match self {
            Self::Busy => Err(BvfsError::Busy { job_id }),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimState {
    Claimed,
    AlreadyCached,
    Busy,
}

/// Walk `path` upward, inserting missing `(PathId, PPathId)` edges until the
/// first ancestor that is already hierarchised.
///
/// On success every visited ancestor has a `PathHierarchy` row and sits in
/// `cache`. Stopping at the first known ancestor keeps a whole-job refresh
/// linear in the number of unique paths rather than paths times depth.
pub(crate) fn build_path_hierarchy(
    conn: &Connection,
    cache: &mut PathIdCache,
    path_id: PathId,
    path: &str,
) -> BvfsResult<()> {
    tracing::trace!(target: "bvfs.cache", path, path_id, "building path hierarchy");

    let mut path_id = path_id;
    let mut path = path.to_owned();

    while !path.is_empty() {
        if cache.contains(path_id) {
            return Ok(());
        }

        let params = [SqliteValue::Integer(path_id)];
        let rows = conn
            .query_with_params(
                "SELECT PPathId FROM PathHierarchy WHERE PathId = ?1;",
                &params,
            )
            .map_err(|e| BvfsError::catalog("hierarchy.probe", e))?;
        if !rows.is_empty() {
            // Already in the catalog: the chain above was built earlier.
            cache.insert(path_id);
            return Ok(());
        }

        parent_dir(&mut path);
        let parent_id = create_path_record(conn, &path)?;

        // Cache insert precedes the edge insert: a retry inside the same
        // batch must treat this path as present rather than re-attempt the
        // key.
        cache.insert(path_id);

        let params = [
            SqliteValue::Integer(path_id),
            SqliteValue::Integer(parent_id),
        ];
        conn.execute_with_params(
            "INSERT INTO PathHierarchy (PathId, PPathId) VALUES (?1, ?2);",
            &params,
        )
        .map_err(|e| BvfsError::catalog("hierarchy.insert", e))?;

        path_id = parent_id;
    }

    Ok(())
}

/// Refresh the hierarchy/visibility cache of a single job.
///
/// Idempotent and safe against concurrent invocation: `AlreadyCached` and
/// `Busy` are success-without-work. A failure after the claim leaves
/// `HasCache = -1` behind; `clear_cache` resets it.
pub fn update_path_hierarchy_cache(
    catalog: &Catalog,
    cancel: &CancelToken,
    cache: &mut PathIdCache,
    job_id: JobId,
) -> BvfsResult<RefreshOutcome> {
    let _session = catalog.lock_session();
    refresh_job(catalog, cancel, cache, job_id)
}

/// Refresh one job. The caller holds the session lock.
pub(crate) fn refresh_job(
    catalog: &Catalog,
    cancel: &CancelToken,
    cache: &mut PathIdCache,
    job_id: JobId,
) -> BvfsResult<RefreshOutcome> {
    cancel.check("refresh_claim")?;

    let claim = catalog.immediate_transaction(|conn| {
        let params = [SqliteValue::Integer(job_id)];
        let rows = conn
            .query_with_params("SELECT HasCache FROM Job WHERE JobId = ?1;", &params)
            .map_err(|e| BvfsError::catalog("refresh.probe", e))?;
        let Some(row) = rows.first() else {
            return Err(BvfsError::not_found("Job", job_id.to_string()));
        };
        match row_i64(row, 0, "Job.HasCache")? {
            1 => Ok(ClaimState::AlreadyCached),
            -1 => Ok(ClaimState::Busy),
            _ => {
                conn.execute_with_params(
                    "UPDATE Job SET HasCache = -1 WHERE JobId = ?1;",
                    &params,
                )
                .map_err(|e| BvfsError::catalog("refresh.claim", e))?;
                Ok(ClaimState::Claimed)
            }
        }
    })?;
    // The claim transaction has committed here; the -1 is visible to every
    // other refresher before the first hierarchy write below.

    match claim {
        ClaimState::AlreadyCached => {
            tracing::debug!(target: "bvfs.cache", job_id, "cache already computed");
            return Ok(RefreshOutcome::AlreadyCached);
        }
        ClaimState::Busy => {
            tracing::debug!(target: "bvfs.cache", job_id, "cache refresh already in progress");
            return Ok(RefreshOutcome::Busy);
        }
        ClaimState::Claimed => {}
    }

    cancel.check("visibility_seed")?;
    let conn = catalog.connection();

    // Seed visibility with every path the job captured, directly or through
    // its base jobs.
    let params = [SqliteValue::Integer(job_id), SqliteValue::Integer(job_id)];
    conn.execute_with_params(
        "INSERT INTO PathVisibility (PathId, JobId) \
         SELECT DISTINCT PathId, JobId FROM (\
             SELECT PathId, JobId FROM File WHERE JobId = ?1 \
             UNION \
             SELECT File.PathId, BaseFiles.JobId \
             FROM BaseFiles JOIN File ON (BaseFiles.FileId = File.FileId) \
             WHERE BaseFiles.JobId = ?2\
         ) AS B;",
        &params,
    )
    .map_err(|e| BvfsError::catalog("refresh.seed", e))?;

    // Visible paths not yet hierarchised, materialised so the connection is
    // free for the walk's own statements.
    let params = [SqliteValue::Integer(job_id)];
    let rows = conn
        .query_with_params(
            "SELECT PathVisibility.PathId, Path.Path \
             FROM PathVisibility \
             JOIN Path ON (PathVisibility.PathId = Path.PathId) \
             LEFT JOIN PathHierarchy ON (PathVisibility.PathId = PathHierarchy.PathId) \
             WHERE PathVisibility.JobId = ?1 AND PathHierarchy.PathId IS NULL \
             ORDER BY Path.Path;",
            &params,
        )
        .map_err(|e| BvfsError::catalog("refresh.pending", e))?;
    let mut pending = Vec::with_capacity(rows.len());
    for row in &rows {
        pending.push((
            row_i64(row, 0, "PathVisibility.PathId")?,
            row_text(row, 1, "Path.Path")?.to_owned(),
        ));
    }

    for (path_id, path) in &pending {
        cancel.check("hierarchy_walk")?;
        build_path_hierarchy(conn, cache, *path_id, path)?;
    }

    cancel.check("visibility_closure")?;

    catalog.transaction(|conn| {
        // Fixed point: push visibility one parent level per pass until no
        // new row appears. Terminates because the hierarchy is a forest.
        loop {
            let params = [
                SqliteValue::Integer(job_id),
                SqliteValue::Integer(job_id),
                SqliteValue::Integer(job_id),
            ];
            let inserted = conn
                .execute_with_params(
                    "INSERT INTO PathVisibility (PathId, JobId) \
                     SELECT a.PPathId, ?1 FROM (\
                         SELECT DISTINCT PathHierarchy.PPathId AS PPathId \
                         FROM PathHierarchy \
                         JOIN PathVisibility ON (PathHierarchy.PathId = PathVisibility.PathId) \
                         WHERE PathVisibility.JobId = ?2\
                     ) AS a \
                     WHERE NOT EXISTS (\
                         SELECT 1 FROM PathVisibility \
                         WHERE PathVisibility.PathId = a.PPathId \
                           AND PathVisibility.JobId = ?3\
                     );",
                    &params,
                )
                .map_err(|e| BvfsError::catalog("refresh.closure", e))?;
            if inserted == 0 {
                break;
            }
        }

        let params = [SqliteValue::Integer(job_id)];
        conn.execute_with_params("UPDATE Job SET HasCache = 1 WHERE JobId = ?1;", &params)
            .map_err(|e| BvfsError::catalog("refresh.finish", e))?;
        Ok(())
    })?;

    tracing::debug!(
        target: "bvfs.cache",
        job_id,
        new_paths = pending.len(),
        "path hierarchy cache refreshed"
    );
    Ok(RefreshOutcome::Refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        has_cache, hierarchy_edges, open_catalog, seed_backup_job, visibility_rows,
    };
    use bvfs_catalog::get_path_record;

    #[test]
    fn builder_creates_missing_chain_to_root() {
        let catalog = open_catalog();
        let conn = catalog.connection();
        let leaf = create_path_record(conn, "/a/b/").expect("leaf path");

        let mut cache = PathIdCache::new();
        build_path_hierarchy(conn, &mut cache, leaf, "/a/b/").expect("build");

        let a = get_path_record(conn, "/a/").expect("intermediate created");
        let slash = get_path_record(conn, "/").expect("slash created");
        let root = get_path_record(conn, "").expect("root created");

        let edges = hierarchy_edges(conn);
        assert_eq!(edges, vec![(leaf, a), (a, slash), (slash, root)].into_iter().collect());
        assert!(cache.contains(leaf) && cache.contains(a) && cache.contains(slash));
    }

    #[test]
    fn builder_stops_at_known_ancestor() {
        let catalog = open_catalog();
        let conn = catalog.connection();
        let a = create_path_record(conn, "/a/").expect("a");
        let leaf = create_path_record(conn, "/a/b/").expect("leaf");

        let mut cache = PathIdCache::new();
        build_path_hierarchy(conn, &mut cache, a, "/a/").expect("build /a/");
        let edges_before = hierarchy_edges(conn);

        build_path_hierarchy(conn, &mut cache, leaf, "/a/b/").expect("build /a/b/");
        let mut expected = edges_before;
        expected.insert((leaf, a));
        assert_eq!(hierarchy_edges(conn), expected, "only the new edge is added");
    }

    #[test]
    fn builder_is_a_noop_on_cache_hit() {
        let catalog = open_catalog();
        let conn = catalog.connection();
        let leaf = create_path_record(conn, "/solo/").expect("leaf");

        let mut cache = PathIdCache::new();
        cache.insert(leaf);
        build_path_hierarchy(conn, &mut cache, leaf, "/solo/").expect("build");
        assert!(hierarchy_edges(conn).is_empty(), "cache hit must not touch the catalog");
    }

    #[test]
    fn refresh_builds_hierarchy_and_visibility_closure() {
        let catalog = open_catalog();
        let job_id = seed_backup_job(catalog.connection(), 7, &[("/a/b/", "x")]);

        let mut cache = PathIdCache::new();
        let outcome =
            update_path_hierarchy_cache(&catalog, &CancelToken::new(), &mut cache, job_id)
                .expect("refresh");
        assert_eq!(outcome, RefreshOutcome::Refreshed);

        let conn = catalog.connection();
        let leaf = get_path_record(conn, "/a/b/").expect("leaf");
        let a = get_path_record(conn, "/a/").expect("a");
        let slash = get_path_record(conn, "/").expect("slash");
        let root = get_path_record(conn, "").expect("root");

        assert_eq!(
            hierarchy_edges(conn),
            vec![(leaf, a), (a, slash), (slash, root)].into_iter().collect()
        );
        assert_eq!(
            visibility_rows(conn),
            vec![(leaf, 7), (a, 7), (slash, 7), (root, 7)].into_iter().collect()
        );
        assert_eq!(has_cache(conn, job_id), 1);
    }

    #[test]
    fn refresh_includes_base_job_paths() {
        let catalog = open_catalog();
        let conn = catalog.connection();
        // Base job 5 captured /base/y; job 7 inherits it and adds /a/x.
        let base_job = seed_backup_job(conn, 5, &[("/base/", "y")]);
        let job_id = seed_backup_job(conn, 7, &[("/a/", "x")]);
        let base_file = crate::testutil::file_id_of(conn, base_job, "/base/", "y");
        crate::testutil::insert_base_file(conn, job_id, base_job, base_file, 1);

        let mut cache = PathIdCache::new();
        update_path_hierarchy_cache(&catalog, &CancelToken::new(), &mut cache, job_id)
            .expect("refresh");

        let base_path = get_path_record(conn, "/base/").expect("base path");
        assert!(
            visibility_rows(conn).contains(&(base_path, job_id)),
            "inherited paths must be visible from the inheriting job"
        );
    }

    #[test]
    fn refresh_twice_is_idempotent() {
        let catalog = open_catalog();
        let job_id = seed_backup_job(catalog.connection(), 7, &[("/a/b/", "x"), ("/a/c/", "y")]);

        let mut cache = PathIdCache::new();
        update_path_hierarchy_cache(&catalog, &CancelToken::new(), &mut cache, job_id)
            .expect("first refresh");
        let conn = catalog.connection();
        let edges = hierarchy_edges(conn);
        let visibility = visibility_rows(conn);

        let outcome =
            update_path_hierarchy_cache(&catalog, &CancelToken::new(), &mut cache, job_id)
                .expect("second refresh");
        assert_eq!(outcome, RefreshOutcome::AlreadyCached);
        assert_eq!(hierarchy_edges(conn), edges);
        assert_eq!(visibility_rows(conn), visibility);
        assert_eq!(has_cache(conn, job_id), 1);
    }

    #[test]
    fn refresh_yields_busy_when_another_session_owns_the_claim() {
        let catalog = open_catalog();
        let job_id = seed_backup_job(catalog.connection(), 7, &[("/a/", "x")]);
        catalog
            .connection()
            .execute("UPDATE Job SET HasCache = -1 WHERE JobId = 7;")
            .expect("simulate foreign claim");

        let mut cache = PathIdCache::new();
        let outcome =
            update_path_hierarchy_cache(&catalog, &CancelToken::new(), &mut cache, job_id)
                .expect("refresh");
        assert_eq!(outcome, RefreshOutcome::Busy);
        assert_eq!(has_cache(catalog.connection(), job_id), -1, "claim untouched");
        assert!(hierarchy_edges(catalog.connection()).is_empty(), "no work done");
    }

    #[test]
    fn require_progress_surfaces_contention_as_busy() {
        assert!(matches!(
            RefreshOutcome::Busy.require_progress(7),
            Err(BvfsError::Busy { job_id: 7 })
        ));
        assert!(matches!(
            RefreshOutcome::Refreshed.require_progress(7),
            Ok(RefreshOutcome::Refreshed)
        ));
        assert!(matches!(
            RefreshOutcome::AlreadyCached.require_progress(7),
            Ok(RefreshOutcome::AlreadyCached)
        ));
    }

    #[test]
    fn refresh_of_unknown_job_is_not_found() {
        let catalog = open_catalog();
        let mut cache = PathIdCache::new();
        let err = update_path_hierarchy_cache(&catalog, &CancelToken::new(), &mut cache, 99)
            .expect_err("missing job must fail");
        assert!(matches!(err, BvfsError::NotFound { .. }));
    }

    #[test]
    fn pre_cancelled_token_stops_before_claim() {
        let catalog = open_catalog();
        let job_id = seed_backup_job(catalog.connection(), 7, &[("/a/", "x")]);

        let cancel = CancelToken::new();
        cancel.cancel();

        let mut cache = PathIdCache::new();
        let err = update_path_hierarchy_cache(&catalog, &cancel, &mut cache, job_id)
            .expect_err("cancelled refresh must fail");
        assert!(matches!(err, BvfsError::Cancelled { .. }));
        assert_eq!(
            has_cache(catalog.connection(), job_id),
            0,
            "cancellation before the claim must not leave a marker"
        );
    }
}

//! Cache maintenance across jobs: batch refresh, visibility GC, full reset.

use bvfs_catalog::{Catalog, row_i64};
use bvfs_core::{BvfsError, BvfsResult, CancelToken, JobId, parse_id_list};
use serde::{Deserialize, Serialize};

use crate::cache::PathIdCache;
use crate::hierarchy::{RefreshOutcome, refresh_job};

/// Jobs eligible for cache building: finished backups, including those that
/// ended with warnings, incomplete sets, or were archived.
const ELIGIBLE_JOBS_SQL: &str = "SELECT JobId FROM Job \
     WHERE HasCache = 0 AND Type = 'B' AND JobStatus IN ('T', 'W', 'f', 'A') \
     ORDER BY JobId;";

/// Summary of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSummary {
    /// Jobs whose cache this pass computed.
    pub refreshed: usize,
    /// Jobs skipped because they were already cached or claimed elsewhere.
    pub skipped: usize,
    /// `PathVisibility` rows evicted because their job no longer exists.
    pub evicted_visibility_rows: usize,
}

/// Refresh every eligible job, then garbage-collect orphaned visibility
/// rows. One shared [`PathIdCache`] serves the whole batch.
pub fn update_cache(catalog: &Catalog, cancel: &CancelToken) -> BvfsResult<MaintenanceSummary> {
    let _session = catalog.lock_session();

    cancel.check("cache_update")?;
    let rows = catalog
        .connection()
        .query(ELIGIBLE_JOBS_SQL)
        .map_err(|e| BvfsError::catalog("maintenance.eligible", e))?;
    let mut job_ids = Vec::with_capacity(rows.len());
    for row in &rows {
        job_ids.push(row_i64(row, 0, "Job.JobId")?);
    }

    let mut summary = refresh_batch(catalog, cancel, &job_ids)?;
    summary.evicted_visibility_rows = evict_orphaned_visibility(catalog)?;

    tracing::info!(
        target: "bvfs.cache",
        refreshed = summary.refreshed,
        skipped = summary.skipped,
        evicted = summary.evicted_visibility_rows,
        "cache maintenance pass complete"
    );
    Ok(summary)
}

/// Refresh exactly the jobs named in a comma-separated id list.
pub fn update_cache_for_job_ids(
    catalog: &Catalog,
    cancel: &CancelToken,
    job_ids: &str,
) -> BvfsResult<MaintenanceSummary> {
    let ids = parse_id_list(job_ids, "jobids")?;
    update_cache_for_jobs(catalog, cancel, &ids)
}

/// Refresh exactly the given jobs, sharing one [`PathIdCache`].
pub fn update_cache_for_jobs(
    catalog: &Catalog,
    cancel: &CancelToken,
    job_ids: &[JobId],
) -> BvfsResult<MaintenanceSummary> {
    let _session = catalog.lock_session();
    refresh_batch(catalog, cancel, job_ids)
}

fn refresh_batch(
    catalog: &Catalog,
    cancel: &CancelToken,
    job_ids: &[JobId],
) -> BvfsResult<MaintenanceSummary> {
    let mut cache = PathIdCache::new();
    let mut summary = MaintenanceSummary::default();
    for &job_id in job_ids {
        tracing::debug!(target: "bvfs.cache", job_id, "updating cache for job");
        match refresh_job(catalog, cancel, &mut cache, job_id)? {
            RefreshOutcome::Refreshed => summary.refreshed += 1,
            RefreshOutcome::AlreadyCached | RefreshOutcome::Busy => summary.skipped += 1,
        }
    }
    Ok(summary)
}

fn evict_orphaned_visibility(catalog: &Catalog) -> BvfsResult<usize> {
    catalog.transaction(|conn| {
        let rows = conn
            .query(
                "SELECT COUNT(*) FROM PathVisibility \
                 WHERE NOT EXISTS (SELECT 1 FROM Job WHERE Job.JobId = PathVisibility.JobId);",
            )
            .map_err(|e| BvfsError::catalog("maintenance.gc", e))?;
        let orphaned = rows
            .first()
            .map(|row| row_i64(row, 0, "PathVisibility.orphaned"))
            .transpose()?
            .unwrap_or(0);
        if orphaned == 0 {
            return Ok(0);
        }

        conn.execute(
            "DELETE FROM PathVisibility \
             WHERE NOT EXISTS (SELECT 1 FROM Job WHERE Job.JobId = PathVisibility.JobId);",
        )
        .map_err(|e| BvfsError::catalog("maintenance.gc", e))?;

        let evicted = usize::try_from(orphaned).unwrap_or(0);
        tracing::debug!(target: "bvfs.cache", evicted, "evicted orphaned visibility rows");
        Ok(evicted)
    })
}

/// Forget every computed hierarchy and visibility row and reset all job
/// flags, including stuck `-1` claims left by crashed or cancelled
/// refreshers.
pub fn clear_cache(catalog: &Catalog) -> BvfsResult<()> {
    let _session = catalog.lock_session();
    let dialect = catalog.dialect();
    catalog.transaction(|conn| {
        conn.execute("UPDATE Job SET HasCache = 0;")
            .map_err(|e| BvfsError::catalog("maintenance.clear", e))?;
        conn.execute(&dialect.clear_table_sql("PathHierarchy"))
            .map_err(|e| BvfsError::catalog("maintenance.clear", e))?;
        conn.execute(&dialect.clear_table_sql("PathVisibility"))
            .map_err(|e| BvfsError::catalog("maintenance.clear", e))?;
        Ok(())
    })?;
    tracing::info!(target: "bvfs.cache", "hierarchy and visibility caches cleared");
    Ok(())
}

//! Restore-selection compilation into persisted `b2*` tables.
//!
//! A selection names individual files, whole directories, and hardlink
//! `(jobid, fileindex)` pairs. The three kinds are compiled into one SQL
//! union, staged into `btemp<T>`, and the newest version per
//! `(PathId, Name)` is snapshotted into the output table `T` that the
//! restore machinery consumes.

use std::collections::BTreeMap;
use std::sync::Arc;

use bvfs_catalog::{Catalog, Dialect, path_of};
use bvfs_core::{BvfsError, BvfsResult, parse_id_list, parse_id_pairs};
use fsqlite::Connection;

use crate::session::{BvfsSession, join_ids};

/// Restore tables live in the `b2<digits>` namespace; everything else is
/// refused so the compiler can never touch a catalog table.
fn is_restore_table_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 2
        && bytes[0] == b'b'
        && bytes[1] == b'2'
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

fn ensure_restore_table_name(name: &str) -> BvfsResult<()> {
    if is_restore_table_name(name) {
        return Ok(());
    }
    Err(BvfsError::invalid_argument(
        "output_table",
        name,
        "restore tables must match b2<digits>",
    ))
}

impl BvfsSession {
    /// Compile a restore selection into the persisted table `output_table`.
    ///
    /// At least one of the three id lists must be non-empty; `hardlinks`
    /// must hold an even number of ids. A pre-existing table of the same
    /// name is replaced. On failure both the staging table and the output
    /// table are dropped best-effort.
    pub fn compute_restore_list(
        &self,
        file_ids: &str,
        dir_ids: &str,
        hardlinks: &str,
        output_table: &str,
    ) -> BvfsResult<()> {
        ensure_restore_table_name(output_table)?;
        let file_id_list = parse_id_list(file_ids, "fileid")?;
        let dir_id_list = parse_id_list(dir_ids, "dirid")?;
        let hardlink_pairs = parse_id_pairs(hardlinks, "hardlink")?;
        if file_id_list.is_empty() && dir_id_list.is_empty() && hardlink_pairs.is_empty() {
            return Err(BvfsError::invalid_argument(
                "selection",
                "",
                "at least one of fileid, dirid, hardlink must be non-empty",
            ));
        }
        if !dir_id_list.is_empty() && self.job_ids().is_empty() {
            return Err(BvfsError::invalid_argument(
                "jobids",
                "",
                "directory selection requires a job scope",
            ));
        }
        self.cancel_token().check("restore_list")?;

        let catalog = Arc::clone(self.catalog());
        let _session = catalog.lock_session();
        let conn = catalog.connection();
        let staging = format!("btemp{output_table}");

        // Replace leftovers from an earlier compilation of the same name.
        drop_table(conn, &staging);
        drop_table(conn, output_table);

        let result = build_and_snapshot(
            &catalog,
            &self.job_ids_sql(),
            &file_id_list,
            &dir_id_list,
            &hardlink_pairs,
            &staging,
            output_table,
        );

        // The staging table never outlives the compilation; the output
        // table only survives success.
        drop_table(conn, &staging);
        if result.is_err() {
            drop_table(conn, output_table);
        }
        match &result {
            Ok(()) => tracing::debug!(
                target: "bvfs.restore",
                output_table,
                "restore selection compiled"
            ),
            Err(err) => tracing::debug!(
                target: "bvfs.restore",
                output_table,
                ?err,
                "restore selection failed; tables dropped"
            ),
        }
        result
    }

    /// Drop a previously compiled restore table, refusing names outside the
    /// `b2<digits>` namespace.
    pub fn drop_restore_list(&self, output_table: &str) -> BvfsResult<()> {
        ensure_restore_table_name(output_table)?;
        let catalog = Arc::clone(self.catalog());
        let _session = catalog.lock_session();
        catalog
            .connection()
            .execute(&format!("DROP TABLE IF EXISTS {output_table};"))
            .map_err(|e| BvfsError::catalog("restore.drop", e))?;
        Ok(())
    }
}

fn build_and_snapshot(
    catalog: &Catalog,
    jobids: &str,
    file_id_list: &[i64],
    dir_id_list: &[i64],
    hardlink_pairs: &[(i64, i64)],
    staging: &str,
    output_table: &str,
) -> BvfsResult<()> {
    let conn = catalog.connection();
    let dialect = catalog.dialect();
    let mut branches: Vec<String> = Vec::new();

    if !file_id_list.is_empty() {
        let list = join_ids(file_id_list);
        branches.push(format!(
            "SELECT Job.JobId AS JobId, Job.JobTDate AS JobTDate, \
                    File.FileIndex AS FileIndex, File.Name AS Name, \
                    File.PathId AS PathId, File.FileId AS FileId \
             FROM File JOIN Job ON (File.JobId = Job.JobId) \
             WHERE File.FileId IN ({list})"
        ));
    }

    for &dir_id in dir_id_list {
        let path = path_of(conn, dir_id)?;
        // Escape LIKE metacharacters in the stored path, then anchor the
        // prefix match.
        let like = dialect.escape_string(&format!("{}%", dialect.escape_like(&path)));
        let escape = dialect.like_escape_clause();
        branches.push(format!(
            "SELECT Job.JobId AS JobId, Job.JobTDate AS JobTDate, \
                    File.FileIndex AS FileIndex, File.Name AS Name, \
                    File.PathId AS PathId, File.FileId AS FileId \
             FROM Path \
             JOIN File ON (Path.PathId = File.PathId) \
             JOIN Job ON (File.JobId = Job.JobId) \
             WHERE Path.Path LIKE '{like}'{escape} AND File.JobId IN ({jobids})"
        ));
        // A directory can also hold files a job inherited from its base.
        branches.push(format!(
            "SELECT File.JobId AS JobId, Job.JobTDate AS JobTDate, \
                    BaseFiles.FileIndex AS FileIndex, File.Name AS Name, \
                    File.PathId AS PathId, BaseFiles.FileId AS FileId \
             FROM BaseFiles \
             JOIN File ON (BaseFiles.FileId = File.FileId) \
             JOIN Job ON (BaseFiles.JobId = Job.JobId) \
             JOIN Path ON (File.PathId = Path.PathId) \
             WHERE Path.Path LIKE '{like}'{escape} AND BaseFiles.JobId IN ({jobids})"
        ));
    }

    // Hardlink pairs coalesce into one IN-list per job.
    let mut by_job: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for &(job_id, file_index) in hardlink_pairs {
        by_job.entry(job_id).or_default().push(file_index);
    }
    for (job_id, file_indexes) in &by_job {
        let list = join_ids(file_indexes);
        branches.push(format!(
            "SELECT Job.JobId AS JobId, Job.JobTDate AS JobTDate, \
                    File.FileIndex AS FileIndex, File.Name AS Name, \
                    File.PathId AS PathId, File.FileId AS FileId \
             FROM File JOIN Job ON (File.JobId = Job.JobId) \
             WHERE File.JobId = {job_id} AND File.FileIndex IN ({list})"
        ));
    }

    let union = branches.join(" UNION ");
    conn.execute(&format!("CREATE TABLE {staging} AS {union};"))
        .map_err(|e| BvfsError::catalog("restore.stage", e))?;

    conn.execute(&snapshot_sql(dialect, staging, output_table))
        .map_err(|e| BvfsError::catalog("restore.snapshot", e))?;

    if dialect.wants_restore_jobid_index() {
        conn.execute(&format!(
            "CREATE INDEX idx_{output_table} ON {output_table} (JobId);"
        ))
        .map_err(|e| BvfsError::catalog("restore.index", e))?;
    }

    Ok(())
}

/// The apex: one row per `(PathId, Name)`, the one with the newest
/// `JobTDate`. Ties fall to the larger `JobId`, then `FileId`, so the
/// winner is unique even when two jobs share a timestamp.
fn snapshot_sql(dialect: Dialect, staging: &str, output_table: &str) -> String {
    if dialect.supports_distinct_on() {
        format!(
            "CREATE TABLE {output_table} AS \
             SELECT JobId, JobTDate, FileIndex, Name, PathId, FileId FROM (\
                 SELECT DISTINCT ON (PathId, Name) \
                        JobId, JobTDate, FileIndex, Name, PathId, FileId \
                 FROM {staging} \
                 ORDER BY PathId, Name, JobTDate DESC, JobId DESC, FileId DESC\
             ) AS T;"
        )
    } else {
        format!(
            "CREATE TABLE {output_table} AS \
             SELECT b.JobId, b.JobTDate, b.FileIndex, b.Name, b.PathId, b.FileId \
             FROM {staging} AS b \
             WHERE b.JobTDate = (\
                 SELECT MAX(b2.JobTDate) FROM {staging} AS b2 \
                 WHERE b2.PathId = b.PathId AND b2.Name = b.Name\
             ) AND b.JobId = (\
                 SELECT MAX(b3.JobId) FROM {staging} AS b3 \
                 WHERE b3.PathId = b.PathId AND b3.Name = b.Name \
                   AND b3.JobTDate = b.JobTDate\
             ) AND b.FileId = (\
                 SELECT MAX(b4.FileId) FROM {staging} AS b4 \
                 WHERE b4.PathId = b.PathId AND b4.Name = b.Name \
                   AND b4.JobTDate = b.JobTDate AND b4.JobId = b.JobId\
             );"
        )
    }
}

fn drop_table(conn: &Connection, table: &str) {
    if let Err(error) = conn.execute(&format!("DROP TABLE IF EXISTS {table};")) {
        tracing::trace!(target: "bvfs.restore", table, %error, "drop of scratch table failed");
    }
}

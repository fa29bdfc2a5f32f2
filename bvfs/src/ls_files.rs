//! File listing under the session's current directory.
//!
//! The listing folds base-job inheritance: a file a job inherited through
//! `BaseFiles` appears under the inheriting job, and a re-capture by a
//! newer job shadows the inherited version unless the session asks for all
//! versions.

use std::ops::ControlFlow;
use std::sync::Arc;

use bvfs_catalog::{Dialect, row_i64, row_text};
use bvfs_core::{BvfsError, BvfsResult, FileEntry, PathId};

use crate::session::BvfsSession;

/// The direct-capture/base-inheritance union every file query selects from.
fn files_union_sql(jobids: &str, pwd: PathId) -> String {
    format!(
        "SELECT File.FileId AS FileId, File.JobId AS JobId, File.PathId AS PathId, \
                File.Name AS Name, File.FileIndex AS FileIndex, File.LStat AS LStat \
         FROM File \
         WHERE File.JobId IN ({jobids}) AND File.PathId = {pwd} \
         UNION ALL \
         SELECT File.FileId, BaseFiles.JobId, File.PathId, File.Name, \
                BaseFiles.FileIndex, File.LStat \
         FROM BaseFiles JOIN File ON (BaseFiles.FileId = File.FileId) \
         WHERE BaseFiles.JobId IN ({jobids}) AND File.PathId = {pwd}"
    )
}

/// Shadowing filter for backends without `DISTINCT ON`: the newest
/// `JobTDate` wins per name, ties broken by `FileId` then `JobId` so the
/// winner is unique.
fn shadow_filter_sql(core: &str) -> String {
    format!(
        " AND Job.JobTDate = (\
             SELECT MAX(JobB.JobTDate) FROM ({core}) AS TB \
             JOIN Job AS JobB ON (TB.JobId = JobB.JobId) WHERE TB.Name = T.Name\
         ) AND T.FileId = (\
             SELECT MAX(TC.FileId) FROM ({core}) AS TC \
             JOIN Job AS JobC ON (TC.JobId = JobC.JobId) \
             WHERE TC.Name = T.Name AND JobC.JobTDate = Job.JobTDate\
         ) AND T.JobId = (\
             SELECT MAX(TD.JobId) FROM ({core}) AS TD \
             JOIN Job AS JobD ON (TD.JobId = JobD.JobId) \
             WHERE TD.Name = T.Name AND JobD.JobTDate = Job.JobTDate \
               AND TD.FileId = T.FileId\
         )"
    )
}

fn build_ls_files_query(
    dialect: Dialect,
    jobids: &str,
    pwd: PathId,
    pattern_filter: &str,
    see_all_versions: bool,
    limit: u64,
    offset: u64,
) -> String {
    let core = files_union_sql(jobids, pwd);
    if see_all_versions {
        format!(
            "SELECT T.PathId, T.Name, T.JobId, T.LStat, T.FileId, T.FileIndex \
             FROM ({core}) AS T JOIN Job ON (T.JobId = Job.JobId) \
             WHERE T.Name != ''{pattern_filter} \
             ORDER BY T.Name, Job.JobTDate DESC, T.JobId DESC \
             LIMIT {limit} OFFSET {offset};"
        )
    } else if dialect.supports_distinct_on() {
        format!(
            "SELECT PathId, Name, JobId, LStat, FileId, FileIndex FROM (\
                 SELECT DISTINCT ON (T.Name) T.PathId AS PathId, T.Name AS Name, \
                        T.JobId AS JobId, T.LStat AS LStat, T.FileId AS FileId, \
                        T.FileIndex AS FileIndex \
                 FROM ({core}) AS T JOIN Job ON (T.JobId = Job.JobId) \
                 WHERE T.Name != ''{pattern_filter} \
                 ORDER BY T.Name, Job.JobTDate DESC, T.FileId DESC, T.JobId DESC\
             ) AS A LIMIT {limit} OFFSET {offset};"
        )
    } else {
        let shadow_filter = shadow_filter_sql(&core);
        format!(
            "SELECT T.PathId, T.Name, T.JobId, T.LStat, T.FileId, T.FileIndex \
             FROM ({core}) AS T JOIN Job ON (T.JobId = Job.JobId) \
             WHERE T.Name != ''{pattern_filter}{shadow_filter} \
             ORDER BY T.Name \
             LIMIT {limit} OFFSET {offset};"
        )
    }
}

impl BvfsSession {
    /// Emit the file leaves visible under the current directory.
    ///
    /// With no current directory set, the root is resolved first; a catalog
    /// with no root path simply lists nothing. Returns whether more rows
    /// may follow the current pagination window.
    pub fn ls_files<F>(&mut self, sink: &mut F) -> BvfsResult<bool>
    where
        F: FnMut(FileEntry) -> ControlFlow<()>,
    {
        if self.job_ids().is_empty() {
            return Ok(false);
        }
        self.cancel_token().check("ls_files")?;

        if self.pwd_id() == 0 {
            match self.root() {
                Ok(root) => self.ch_dir_id(root),
                Err(BvfsError::NotFound { .. }) => return Ok(false),
                Err(err) => return Err(err),
            }
        }

        let catalog = Arc::clone(self.catalog());
        let _session = catalog.lock_session();
        let dialect = catalog.dialect();

        let pattern_filter = match self.pattern() {
            Some(pattern) => format!(
                " AND {}",
                dialect.match_clause("T.Name", &dialect.escape_string(pattern))
            ),
            None => String::new(),
        };
        let query = build_ls_files_query(
            dialect,
            &self.job_ids_sql(),
            self.pwd_id(),
            &pattern_filter,
            self.see_all_versions(),
            self.limit(),
            self.offset(),
        );
        tracing::trace!(target: "bvfs.list", query = %query, "ls_files");

        let rows = catalog
            .connection()
            .query(&query)
            .map_err(|e| BvfsError::catalog("ls_files", e))?;

        for row in &rows {
            let entry = FileEntry {
                path_id: row_i64(row, 0, "File.PathId")?,
                name: row_text(row, 1, "File.Name")?.to_owned(),
                job_id: row_i64(row, 2, "File.JobId")?,
                lstat: row_text(row, 3, "File.LStat")?.to_owned(),
                file_id: row_i64(row, 4, "File.FileId")?,
                file_index: row_i64(row, 5, "File.FileIndex")?,
            };
            if sink(entry).is_break() {
                break;
            }
        }

        Ok(rows.len() as u64 == self.limit())
    }
}

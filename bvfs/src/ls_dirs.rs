//! Directory listing under the session's current directory.

use std::ops::ControlFlow;
use std::sync::Arc;

use bvfs_catalog::{row_i64, row_opt_i64, row_opt_text, row_text};
use bvfs_core::{BvfsError, BvfsResult, DirEntry};

use crate::session::BvfsSession;

impl BvfsSession {
    /// Emit one row per visible child directory of the current directory,
    /// merged over the session's jobs and deduplicated.
    ///
    /// Returns whether more rows may follow the current pagination window
    /// (exactly `limit` rows came back). The sink stops the stream early by
    /// returning [`ControlFlow::Break`].
    pub fn ls_dirs<F>(&mut self, sink: &mut F) -> BvfsResult<bool>
    where
        F: FnMut(DirEntry) -> ControlFlow<()>,
    {
        if self.job_ids().is_empty() {
            return Ok(false);
        }
        self.cancel_token().check("ls_dirs")?;

        let catalog = Arc::clone(self.catalog());
        let _session = catalog.lock_session();
        let dialect = catalog.dialect();

        let jobids = self.job_ids_sql();
        let pattern_filter = match self.pattern() {
            Some(pattern) => format!(
                " AND {}",
                dialect.match_clause("Path2.Path", &dialect.escape_string(pattern))
            ),
            None => String::new(),
        };

        let query = format!(
            "SELECT PathId, Path, JobId, LStat, FileId FROM (\
                 SELECT Path1.PathId AS PathId, Path1.Path AS Path, \
                        listfile1.JobId AS JobId, listfile1.LStat AS LStat, \
                        listfile1.FileId AS FileId \
                 FROM (\
                     SELECT DISTINCT PathHierarchy1.PathId AS PathId \
                     FROM PathHierarchy AS PathHierarchy1 \
                     JOIN Path AS Path2 ON (PathHierarchy1.PathId = Path2.PathId) \
                     JOIN PathVisibility AS PathVisibility1 \
                       ON (PathHierarchy1.PathId = PathVisibility1.PathId) \
                     WHERE PathHierarchy1.PPathId = {pwd} \
                       AND PathVisibility1.JobId IN ({jobids}){pattern_filter}\
                 ) AS listpath1 \
                 JOIN Path AS Path1 ON (listpath1.PathId = Path1.PathId) \
                 LEFT JOIN (\
                     SELECT File1.PathId AS PathId, File1.JobId AS JobId, \
                            File1.LStat AS LStat, File1.FileId AS FileId \
                     FROM File AS File1 \
                     WHERE File1.Name = '' AND File1.JobId IN ({jobids})\
                 ) AS listfile1 ON (listpath1.PathId = listfile1.PathId)\
             ) AS A ORDER BY Path, JobId DESC LIMIT {limit} OFFSET {offset};",
            pwd = self.pwd_id(),
            limit = self.limit(),
            offset = self.offset(),
        );
        tracing::trace!(target: "bvfs.list", query = %query, "ls_dirs");

        let rows = catalog
            .connection()
            .query(&query)
            .map_err(|e| BvfsError::catalog("ls_dirs", e))?;

        // The query legitimately yields the same path once per contributing
        // job; only the first occurrence is emitted.
        self.prev_dir.clear();
        for row in &rows {
            let path = row_text(row, 1, "Path.Path")?;
            if path == self.prev_dir {
                continue;
            }
            self.prev_dir.clear();
            self.prev_dir.push_str(path);

            let entry = DirEntry {
                path_id: row_i64(row, 0, "Path.PathId")?,
                path: path.to_owned(),
                job_id: row_opt_i64(row, 2, "File.JobId")?,
                lstat: row_opt_text(row, 3, "File.LStat")?,
                file_id: row_opt_i64(row, 4, "File.FileId")?,
            };
            if sink(entry).is_break() {
                break;
            }
        }

        Ok(rows.len() as u64 == self.limit())
    }

    /// Emit the two synthetic entries `.` and `..` with the same attribute
    /// join as [`BvfsSession::ls_dirs`]. At the root there is no parent and
    /// only `.` appears.
    pub fn ls_special_dirs<F>(&mut self, sink: &mut F) -> BvfsResult<()>
    where
        F: FnMut(DirEntry) -> ControlFlow<()>,
    {
        if self.job_ids().is_empty() {
            return Ok(());
        }
        self.cancel_token().check("ls_special_dirs")?;

        let catalog = Arc::clone(self.catalog());
        let _session = catalog.lock_session();

        let jobids = self.job_ids_sql();
        let query = format!(
            "SELECT tmp.PathId, tmp.Path, JobId, LStat, FileId \
             FROM (\
                 SELECT PPathId AS PathId, '..' AS Path \
                 FROM PathHierarchy WHERE PathId = {pwd} \
                 UNION \
                 SELECT {pwd} AS PathId, '.' AS Path\
             ) AS tmp \
             LEFT JOIN (\
                 SELECT File1.PathId AS PathId, File1.JobId AS JobId, \
                        File1.LStat AS LStat, File1.FileId AS FileId \
                 FROM File AS File1 \
                 WHERE File1.Name = '' AND File1.JobId IN ({jobids})\
             ) AS listfile1 ON (tmp.PathId = listfile1.PathId) \
             ORDER BY tmp.Path, JobId DESC;",
            pwd = self.pwd_id(),
        );
        tracing::trace!(target: "bvfs.list", query = %query, "ls_special_dirs");

        let rows = catalog
            .connection()
            .query(&query)
            .map_err(|e| BvfsError::catalog("ls_special_dirs", e))?;

        self.prev_dir.clear();
        for row in &rows {
            let path = row_text(row, 1, "tmp.Path")?;
            if path == self.prev_dir {
                continue;
            }
            self.prev_dir.clear();
            self.prev_dir.push_str(path);

            let entry = DirEntry {
                path_id: row_i64(row, 0, "tmp.PathId")?,
                path: path.to_owned(),
                job_id: row_opt_i64(row, 2, "File.JobId")?,
                lstat: row_opt_text(row, 3, "File.LStat")?,
                file_id: row_opt_i64(row, 4, "File.FileId")?,
            };
            if sink(entry).is_break() {
                break;
            }
        }
        Ok(())
    }
}

//! Version enumeration for a single catalogued file.

use std::ops::ControlFlow;
use std::sync::Arc;

use bvfs_catalog::{get_path_record, row_i64, row_opt_text, row_text};
use bvfs_core::{BvfsError, BvfsResult, JobType, PathId, VersionEntry};
use fsqlite_types::value::SqliteValue;

use crate::session::BvfsSession;

impl BvfsSession {
    /// Like [`BvfsSession::all_file_versions`], resolving the directory path
    /// first. A path unknown to the catalog is `NotFound`.
    pub fn all_file_versions_by_path<F>(
        &self,
        path: &str,
        fname: &str,
        client: &str,
        sink: &mut F,
    ) -> BvfsResult<bool>
    where
        F: FnMut(VersionEntry) -> ControlFlow<()>,
    {
        let path_id = {
            let catalog = Arc::clone(self.catalog());
            let _session = catalog.lock_session();
            get_path_record(catalog.connection(), path)?
        };
        self.all_file_versions(path_id, fname, client, sink)
    }

    /// Emit every catalogued version of `(path_id, fname)` taken for
    /// `client`, newest last by `FileId` order, paginated.
    ///
    /// `see_copies` widens the job filter to copy jobs; without
    /// `see_all_versions` only the newest version survives. Returns whether
    /// more rows may follow the pagination window.
    pub fn all_file_versions<F>(
        &self,
        path_id: PathId,
        fname: &str,
        client: &str,
        sink: &mut F,
    ) -> BvfsResult<bool>
    where
        F: FnMut(VersionEntry) -> ControlFlow<()>,
    {
        self.cancel_token().check("versions")?;
        tracing::debug!(
            target: "bvfs.list",
            path_id,
            fname,
            client,
            see_copies = self.see_copies(),
            "listing file versions"
        );

        let catalog = Arc::clone(self.catalog());
        let _session = catalog.lock_session();

        let backup = JobType::Backup.as_char();
        let copy = JobType::Copy.as_char();
        let type_filter = if self.see_copies() {
            format!("Job.Type IN ('{copy}', '{backup}')")
        } else {
            format!("Job.Type = '{backup}'")
        };
        let subquery_type_filter = if self.see_copies() {
            format!("Job2.Type IN ('{copy}', '{backup}')")
        } else {
            format!("Job2.Type = '{backup}'")
        };
        let superseded_filter = if self.see_all_versions() {
            String::new()
        } else {
            format!(
                " AND Job.JobTDate = (\
                     SELECT MAX(Job2.JobTDate) FROM File AS File2 \
                     JOIN Job AS Job2 ON (File2.JobId = Job2.JobId) \
                     JOIN Client AS Client2 ON (Job2.ClientId = Client2.ClientId) \
                     WHERE File2.Name = ?1 AND File2.PathId = ?2 \
                       AND Client2.Name = ?3 AND {subquery_type_filter}\
                 )"
            )
        };

        let query = format!(
            "SELECT Job.JobId, File.FileId, Job.JobTDate, File.LStat, File.Md5 \
             FROM File \
             JOIN Job ON (File.JobId = Job.JobId) \
             JOIN Client ON (Job.ClientId = Client.ClientId) \
             WHERE File.Name = ?1 AND File.PathId = ?2 AND Client.Name = ?3 \
               AND {type_filter}{superseded_filter} \
             ORDER BY File.FileId LIMIT {limit} OFFSET {offset};",
            limit = self.limit(),
            offset = self.offset(),
        );

        let params = [
            SqliteValue::Text(fname.to_owned()),
            SqliteValue::Integer(path_id),
            SqliteValue::Text(client.to_owned()),
        ];
        let rows = catalog
            .connection()
            .query_with_params(&query, &params)
            .map_err(|e| BvfsError::catalog("versions", e))?;

        for row in &rows {
            let entry = VersionEntry {
                job_id: row_i64(row, 0, "Job.JobId")?,
                file_id: row_i64(row, 1, "File.FileId")?,
                job_tdate: row_i64(row, 2, "Job.JobTDate")?,
                lstat: row_text(row, 3, "File.LStat")?.to_owned(),
                md5: row_opt_text(row, 4, "File.Md5")?,
                volume_name: None,
            };
            if sink(entry).is_break() {
                break;
            }
        }

        Ok(rows.len() as u64 == self.limit())
    }
}

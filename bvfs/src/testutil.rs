//! Shared fixtures for the in-memory catalog tests.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use bvfs_catalog::{Catalog, create_path_record, row_i64, row_text};
use bvfs_core::{DirEntry, FileEntry, JobId, PathId, VersionEntry};
use fsqlite::Connection;
use fsqlite_types::value::SqliteValue;

use crate::session::BvfsSession;

pub(crate) fn open_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::open_in_memory().expect("in-memory catalog should open"))
}

pub(crate) fn session_for_jobs(catalog: &Arc<Catalog>, job_ids: &str) -> BvfsSession {
    let mut session = BvfsSession::new(Arc::clone(catalog));
    session.set_job_ids(job_ids).expect("job id list");
    session
}

pub(crate) fn insert_job(
    conn: &Connection,
    job_id: i64,
    job_type: char,
    status: &str,
    tdate: i64,
    has_cache: i64,
) {
    let params = [
        SqliteValue::Integer(job_id),
        SqliteValue::Text(format!("job-{job_id}").into()),
        SqliteValue::Text(job_type.to_string().into()),
        SqliteValue::Text(status.to_owned().into()),
        SqliteValue::Integer(tdate),
        SqliteValue::Integer(has_cache),
    ];
    conn.execute_with_params(
        "INSERT INTO Job (JobId, Name, Type, JobStatus, JobTDate, HasCache) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        &params,
    )
    .expect("insert job");
}

pub(crate) fn insert_client(conn: &Connection, client_id: i64, name: &str) {
    let params = [
        SqliteValue::Integer(client_id),
        SqliteValue::Text(name.to_owned().into()),
    ];
    conn.execute_with_params(
        "INSERT INTO Client (ClientId, Name) VALUES (?1, ?2);",
        &params,
    )
    .expect("insert client");
}

pub(crate) fn assign_client(conn: &Connection, job_id: i64, client_id: i64) {
    let params = [
        SqliteValue::Integer(client_id),
        SqliteValue::Integer(job_id),
    ];
    conn.execute_with_params("UPDATE Job SET ClientId = ?1 WHERE JobId = ?2;", &params)
        .expect("assign client");
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn insert_file(
    conn: &Connection,
    file_id: i64,
    job_id: i64,
    path_id: i64,
    name: &str,
    file_index: i64,
    lstat: &str,
    md5: Option<&str>,
) {
    let params = [
        SqliteValue::Integer(file_id),
        SqliteValue::Integer(job_id),
        SqliteValue::Integer(path_id),
        SqliteValue::Text(name.to_owned().into()),
        SqliteValue::Integer(file_index),
        SqliteValue::Text(lstat.to_owned().into()),
        match md5 {
            Some(digest) => SqliteValue::Text(digest.to_owned().into()),
            None => SqliteValue::Null,
        },
    ];
    conn.execute_with_params(
        "INSERT INTO File (FileId, JobId, PathId, Name, FileIndex, LStat, Md5) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        &params,
    )
    .expect("insert file");
}

pub(crate) fn insert_base_file(
    conn: &Connection,
    job_id: i64,
    base_job_id: i64,
    file_id: i64,
    file_index: i64,
) {
    let params = [
        SqliteValue::Integer(job_id),
        SqliteValue::Integer(base_job_id),
        SqliteValue::Integer(file_id),
        SqliteValue::Integer(file_index),
    ];
    conn.execute_with_params(
        "INSERT INTO BaseFiles (JobId, BaseJobId, FileId, FileIndex) \
         VALUES (?1, ?2, ?3, ?4);",
        &params,
    )
    .expect("insert base file");
}

/// Insert a terminated backup job and one `File` row per `(path, name)`.
///
/// `JobTDate` is `job_id * 1000` so later job ids sort as newer captures;
/// `FileId` is `job_id * 100 + ordinal` so fixtures never collide.
pub(crate) fn seed_backup_job(
    conn: &Connection,
    job_id: i64,
    files: &[(&str, &str)],
) -> JobId {
    insert_job(conn, job_id, 'B', "T", job_id * 1_000, 0);
    for (ordinal, (path, name)) in files.iter().enumerate() {
        let path_id = create_path_record(conn, path).expect("seed path");
        let index = ordinal as i64 + 1;
        insert_file(
            conn,
            job_id * 100 + index,
            job_id,
            path_id,
            name,
            index,
            &format!("st-{job_id}-{index}"),
            None,
        );
    }
    job_id
}

pub(crate) fn file_id_of(conn: &Connection, job_id: i64, path: &str, name: &str) -> i64 {
    let params = [
        SqliteValue::Integer(job_id),
        SqliteValue::Text(path.to_owned().into()),
        SqliteValue::Text(name.to_owned().into()),
    ];
    let rows = conn
        .query_with_params(
            "SELECT FileId FROM File JOIN Path ON (File.PathId = Path.PathId) \
             WHERE File.JobId = ?1 AND Path.Path = ?2 AND File.Name = ?3;",
            &params,
        )
        .expect("file lookup");
    row_i64(rows.first().expect("file row"), 0, "File.FileId").expect("file id")
}

pub(crate) fn hierarchy_edges(conn: &Connection) -> BTreeSet<(PathId, PathId)> {
    let rows = conn
        .query("SELECT PathId, PPathId FROM PathHierarchy;")
        .expect("hierarchy query");
    rows.iter()
        .map(|row| {
            (
                row_i64(row, 0, "PathHierarchy.PathId").expect("path id"),
                row_i64(row, 1, "PathHierarchy.PPathId").expect("parent id"),
            )
        })
        .collect()
}

pub(crate) fn visibility_rows(conn: &Connection) -> BTreeSet<(PathId, JobId)> {
    let rows = conn
        .query("SELECT PathId, JobId FROM PathVisibility;")
        .expect("visibility query");
    rows.iter()
        .map(|row| {
            (
                row_i64(row, 0, "PathVisibility.PathId").expect("path id"),
                row_i64(row, 1, "PathVisibility.JobId").expect("job id"),
            )
        })
        .collect()
}

pub(crate) fn has_cache(conn: &Connection, job_id: i64) -> i64 {
    let params = [SqliteValue::Integer(job_id)];
    let rows = conn
        .query_with_params("SELECT HasCache FROM Job WHERE JobId = ?1;", &params)
        .expect("job query");
    row_i64(rows.first().expect("job row"), 0, "Job.HasCache").expect("has cache")
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query(&format!("SELECT 1 FROM \"{table}\" LIMIT 0")).is_ok()
}

/// Rows of a restore table as `(JobId, JobTDate, FileIndex, Name, PathId,
/// FileId)`, ordered by `FileId` for deterministic assertions.
pub(crate) fn restore_rows(
    conn: &Connection,
    table: &str,
) -> Vec<(i64, i64, i64, String, i64, i64)> {
    let rows = conn
        .query(&format!(
            "SELECT JobId, JobTDate, FileIndex, Name, PathId, FileId \
             FROM {table} ORDER BY FileId;"
        ))
        .expect("restore table query");
    rows.iter()
        .map(|row| {
            (
                row_i64(row, 0, "JobId").expect("job id"),
                row_i64(row, 1, "JobTDate").expect("tdate"),
                row_i64(row, 2, "FileIndex").expect("file index"),
                row_text(row, 3, "Name").expect("name").to_owned(),
                row_i64(row, 4, "PathId").expect("path id"),
                row_i64(row, 5, "FileId").expect("file id"),
            )
        })
        .collect()
}

pub(crate) fn collect_dirs(session: &mut BvfsSession) -> (Vec<DirEntry>, bool) {
    let mut entries = Vec::new();
    let has_more = session
        .ls_dirs(&mut |entry| {
            entries.push(entry);
            ControlFlow::Continue(())
        })
        .expect("ls_dirs");
    (entries, has_more)
}

pub(crate) fn collect_files(session: &mut BvfsSession) -> (Vec<FileEntry>, bool) {
    let mut entries = Vec::new();
    let has_more = session
        .ls_files(&mut |entry| {
            entries.push(entry);
            ControlFlow::Continue(())
        })
        .expect("ls_files");
    (entries, has_more)
}

pub(crate) fn collect_versions(
    session: &BvfsSession,
    path_id: PathId,
    fname: &str,
    client: &str,
) -> (Vec<VersionEntry>, bool) {
    let mut entries = Vec::new();
    let has_more = session
        .all_file_versions(path_id, fname, client, &mut |entry| {
            entries.push(entry);
            ControlFlow::Continue(())
        })
        .expect("all_file_versions");
    (entries, has_more)
}

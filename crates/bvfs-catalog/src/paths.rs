//! `Path` record lookup and upsert.
//!
//! Paths are directory strings terminated by `/`; the root is the empty
//! string. The upsert runs inside whatever transaction the caller holds, so
//! a hierarchy walk that fails mid-climb leaves no half-created records
//! behind once the caller rolls back.

use std::io;

use bvfs_core::{BvfsError, BvfsResult, PathId};
use fsqlite::Connection;
use fsqlite_types::value::SqliteValue;

use crate::row::row_i64;

/// Look up the `PathId` for an exact path string, or `NotFound`.
pub fn get_path_record(conn: &Connection, path: &str) -> BvfsResult<PathId> {
    lookup(conn, path)?.ok_or_else(|| BvfsError::not_found("Path", path))
}

/// Look up the `PathId` for an exact path string, creating the row if absent.
pub fn create_path_record(conn: &Connection, path: &str) -> BvfsResult<PathId> {
    if let Some(path_id) = lookup(conn, path)? {
        return Ok(path_id);
    }

    let params = [SqliteValue::Text(path.to_owned().into())];
    conn.execute_with_params("INSERT INTO Path (Path) VALUES (?1);", &params)
        .map_err(|e| BvfsError::catalog("path.create", e))?;

    lookup(conn, path)?.ok_or_else(|| {
        BvfsError::catalog(
            "path.create",
            io::Error::other(format!("inserted Path row not visible for {path:?}")),
        )
    })
}

/// The path string for a `PathId`, or `NotFound`.
pub fn path_of(conn: &Connection, path_id: PathId) -> BvfsResult<String> {
    let params = [SqliteValue::Integer(path_id)];
    let rows = conn
        .query_with_params("SELECT Path FROM Path WHERE PathId = ?1 LIMIT 1;", &params)
        .map_err(|e| BvfsError::catalog("path.lookup", e))?;
    let Some(row) = rows.first() else {
        return Err(BvfsError::not_found("Path", path_id.to_string()));
    };
    crate::row::row_text(row, 0, "Path.Path").map(str::to_owned)
}

fn lookup(conn: &Connection, path: &str) -> BvfsResult<Option<PathId>> {
    let params = [SqliteValue::Text(path.to_owned().into())];
    let rows = conn
        .query_with_params("SELECT PathId FROM Path WHERE Path = ?1 LIMIT 1;", &params)
        .map_err(|e| BvfsError::catalog("path.lookup", e))?;
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    row_i64(row, 0, "Path.PathId").map(Some)
}

//! Typed accessors over catalog result rows.
//!
//! Every decode failure names the column it was reading so a schema drift
//! shows up in the error message instead of as a silent default.

use std::io;

use bvfs_core::{BvfsError, BvfsResult};
use fsqlite::Row;
use fsqlite_types::value::SqliteValue;

const OP: &str = "row_decode";

pub fn row_i64(row: &Row, index: usize, field: &str) -> BvfsResult<i64> {
    match row.get(index) {
        Some(SqliteValue::Integer(value)) => Ok(*value),
        Some(other) => Err(unexpected_type(field, other)),
        None => Err(missing_column(field)),
    }
}

/// Like [`row_i64`] but maps SQL NULL (or an absent column) to `None`, as
/// left-join columns come back either way.
pub fn row_opt_i64(row: &Row, index: usize, field: &str) -> BvfsResult<Option<i64>> {
    match row.get(index) {
        Some(SqliteValue::Integer(value)) => Ok(Some(*value)),
        Some(SqliteValue::Null) | None => Ok(None),
        Some(other) => Err(unexpected_type(field, other)),
    }
}

pub fn row_text<'a>(row: &'a Row, index: usize, field: &str) -> BvfsResult<&'a str> {
    match row.get(index) {
        Some(SqliteValue::Text(value)) => Ok(value),
        Some(other) => Err(unexpected_type(field, other)),
        None => Err(missing_column(field)),
    }
}

/// Like [`row_text`] but maps SQL NULL (or an absent column) to `None`.
pub fn row_opt_text(row: &Row, index: usize, field: &str) -> BvfsResult<Option<String>> {
    match row.get(index) {
        Some(SqliteValue::Text(value)) => Ok(Some(value.to_string())),
        Some(SqliteValue::Null) | None => Ok(None),
        Some(other) => Err(unexpected_type(field, other)),
    }
}

fn unexpected_type(field: &str, value: &SqliteValue) -> BvfsError {
    BvfsError::catalog(
        OP,
        io::Error::other(format!("unexpected type for {field}: {value:?}")),
    )
}

fn missing_column(field: &str) -> BvfsError {
    BvfsError::catalog(OP, io::Error::other(format!("missing column for {field}")))
}

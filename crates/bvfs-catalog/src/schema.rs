//! Catalog schema bootstrap for embedded and test deployments.
//!
//! Production sites usually point the browser at an existing catalog; this
//! module exists so the embedded backend and the test suites can stand up
//! the same tables. Fresh databases bootstrap straight to the latest
//! schema; databases carrying an older `schema_version` marker replay the
//! migrations.

use std::io;

use bvfs_core::{BvfsError, BvfsResult};
use fsqlite::Connection;
use fsqlite_types::value::SqliteValue;

use crate::row::row_i64;

pub const SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

/// Canonical latest schema for brand-new databases.
const LATEST_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS Job (\
        JobId INTEGER PRIMARY KEY AUTOINCREMENT,\
        Name TEXT NOT NULL DEFAULT '',\
        Type TEXT NOT NULL DEFAULT 'B',\
        JobStatus TEXT NOT NULL DEFAULT 'T',\
        JobTDate INTEGER NOT NULL DEFAULT 0,\
        ClientId INTEGER,\
        HasCache INTEGER NOT NULL DEFAULT 0\
    );",
    "CREATE TABLE IF NOT EXISTS Client (\
        ClientId INTEGER PRIMARY KEY AUTOINCREMENT,\
        Name TEXT NOT NULL UNIQUE\
    );",
    "CREATE TABLE IF NOT EXISTS Path (\
        PathId INTEGER PRIMARY KEY AUTOINCREMENT,\
        Path TEXT NOT NULL UNIQUE\
    );",
    "CREATE TABLE IF NOT EXISTS File (\
        FileId INTEGER PRIMARY KEY AUTOINCREMENT,\
        JobId INTEGER NOT NULL,\
        PathId INTEGER NOT NULL,\
        Name TEXT NOT NULL DEFAULT '',\
        FileIndex INTEGER NOT NULL DEFAULT 0,\
        LStat TEXT NOT NULL DEFAULT '',\
        Md5 TEXT\
    );",
    "CREATE TABLE IF NOT EXISTS PathHierarchy (\
        PathId INTEGER PRIMARY KEY,\
        PPathId INTEGER NOT NULL\
    );",
    "CREATE TABLE IF NOT EXISTS PathVisibility (\
        PathId INTEGER NOT NULL,\
        JobId INTEGER NOT NULL,\
        PRIMARY KEY (PathId, JobId)\
    );",
    "CREATE TABLE IF NOT EXISTS BaseFiles (\
        BaseId INTEGER PRIMARY KEY AUTOINCREMENT,\
        JobId INTEGER NOT NULL,\
        BaseJobId INTEGER NOT NULL,\
        FileId INTEGER NOT NULL,\
        FileIndex INTEGER NOT NULL DEFAULT 0\
    );",
    "CREATE INDEX IF NOT EXISTS idx_file_job_path ON File(JobId, PathId);",
    "CREATE INDEX IF NOT EXISTS idx_file_path_name ON File(PathId, Name);",
    "CREATE INDEX IF NOT EXISTS idx_pathvisibility_job ON PathVisibility(JobId);",
    "CREATE INDEX IF NOT EXISTS idx_basefiles_job ON BaseFiles(JobId);",
    "CREATE INDEX IF NOT EXISTS idx_pathhierarchy_ppath ON PathHierarchy(PPathId);",
];

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &[
            "CREATE TABLE IF NOT EXISTS Job (\
                JobId INTEGER PRIMARY KEY AUTOINCREMENT,\
                Name TEXT NOT NULL DEFAULT '',\
                Type TEXT NOT NULL DEFAULT 'B',\
                JobStatus TEXT NOT NULL DEFAULT 'T',\
                JobTDate INTEGER NOT NULL DEFAULT 0,\
                ClientId INTEGER,\
                HasCache INTEGER NOT NULL DEFAULT 0\
            );",
            "CREATE TABLE IF NOT EXISTS Client (\
                ClientId INTEGER PRIMARY KEY AUTOINCREMENT,\
                Name TEXT NOT NULL UNIQUE\
            );",
            "CREATE TABLE IF NOT EXISTS Path (\
                PathId INTEGER PRIMARY KEY AUTOINCREMENT,\
                Path TEXT NOT NULL UNIQUE\
            );",
            "CREATE TABLE IF NOT EXISTS File (\
                FileId INTEGER PRIMARY KEY AUTOINCREMENT,\
                JobId INTEGER NOT NULL,\
                PathId INTEGER NOT NULL,\
                Name TEXT NOT NULL DEFAULT '',\
                FileIndex INTEGER NOT NULL DEFAULT 0,\
                LStat TEXT NOT NULL DEFAULT '',\
                Md5 TEXT\
            );",
            "CREATE TABLE IF NOT EXISTS PathHierarchy (\
                PathId INTEGER PRIMARY KEY,\
                PPathId INTEGER NOT NULL\
            );",
            "CREATE TABLE IF NOT EXISTS PathVisibility (\
                PathId INTEGER NOT NULL,\
                JobId INTEGER NOT NULL,\
                PRIMARY KEY (PathId, JobId)\
            );",
            "CREATE TABLE IF NOT EXISTS BaseFiles (\
                BaseId INTEGER PRIMARY KEY AUTOINCREMENT,\
                JobId INTEGER NOT NULL,\
                BaseJobId INTEGER NOT NULL,\
                FileId INTEGER NOT NULL,\
                FileIndex INTEGER NOT NULL DEFAULT 0\
            );",
            "CREATE INDEX IF NOT EXISTS idx_file_job_path ON File(JobId, PathId);",
            "CREATE INDEX IF NOT EXISTS idx_pathvisibility_job ON PathVisibility(JobId);",
            "CREATE INDEX IF NOT EXISTS idx_basefiles_job ON BaseFiles(JobId);",
        ],
    },
    Migration {
        version: 2,
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_file_path_name ON File(PathId, Name);",
            "CREATE INDEX IF NOT EXISTS idx_pathhierarchy_ppath ON PathHierarchy(PPathId);",
        ],
    },
];

pub fn bootstrap(conn: &Connection) -> BvfsResult<()> {
    conn.execute("BEGIN IMMEDIATE;")
        .map_err(|e| BvfsError::catalog("schema.begin", e))?;
    let result = bootstrap_inner(conn);
    match result {
        Ok(()) => conn
            .execute("COMMIT;")
            .map(|_| ())
            .map_err(|e| BvfsError::catalog("schema.commit", e)),
        Err(error) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK;") {
                tracing::warn!(
                    target: "bvfs.catalog",
                    error = %rollback_err,
                    "rollback failed after schema bootstrap error"
                );
            }
            Err(error)
        }
    }
}

fn bootstrap_inner(conn: &Connection) -> BvfsResult<()> {
    conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);")
        .map_err(|e| BvfsError::catalog("schema.version_table", e))?;

    let mut version = current_version_optional(conn)?.unwrap_or(0);
    if version == 0 {
        tracing::debug!(
            target: "bvfs.catalog",
            to_version = SCHEMA_VERSION,
            "bootstrapping fresh catalog directly to latest schema"
        );

        for statement in LATEST_SCHEMA {
            conn.execute(statement)
                .map_err(|e| BvfsError::catalog("schema.create", e))?;
        }

        // Multiple threads may bootstrap the same on-disk database at once.
        // OR REPLACE leaves a visible marker row either way.
        let params = [SqliteValue::Integer(SCHEMA_VERSION)];
        conn.execute_with_params(
            "INSERT OR REPLACE INTO schema_version(version) VALUES (?1);",
            &params,
        )
        .map_err(|e| BvfsError::catalog("schema.mark", e))?;
        version = current_version(conn)?;
    }

    if version > SCHEMA_VERSION {
        return Err(BvfsError::catalog(
            "schema.version_check",
            io::Error::other(format!(
                "schema version {version} is newer than supported {SCHEMA_VERSION}"
            )),
        ));
    }

    while version < SCHEMA_VERSION {
        let next_version = version.saturating_add(1);
        let Some(migration) = MIGRATIONS
            .iter()
            .find(|migration| migration.version == next_version)
        else {
            return Err(BvfsError::catalog(
                "schema.migrate",
                io::Error::other(format!(
                    "missing migration path from schema version {version} to {next_version}"
                )),
            ));
        };

        tracing::debug!(
            target: "bvfs.catalog",
            from_version = version,
            to_version = migration.version,
            "applying catalog schema migration"
        );

        for statement in migration.statements {
            conn.execute(statement)
                .map_err(|e| BvfsError::catalog("schema.migrate", e))?;
        }

        let params = [SqliteValue::Integer(migration.version)];
        conn.execute_with_params(
            "INSERT OR REPLACE INTO schema_version(version) VALUES (?1);",
            &params,
        )
        .map_err(|e| BvfsError::catalog("schema.mark", e))?;
        version = migration.version;
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> BvfsResult<i64> {
    current_version_optional(conn)?.ok_or_else(|| {
        BvfsError::catalog(
            "schema.version",
            io::Error::other("schema_version table has no rows"),
        )
    })
}

fn current_version_optional(conn: &Connection) -> BvfsResult<Option<i64>> {
    let rows = conn
        .query("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1;")
        .map_err(|e| BvfsError::catalog("schema.version", e))?;
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    row_i64(row, 0, "schema_version.version").map(Some)
}

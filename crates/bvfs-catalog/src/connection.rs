use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bvfs_core::{BvfsError, BvfsResult};
use fsqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::metrics::{CatalogMetrics, CatalogMetricsSnapshot};
use crate::schema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    pub db_path: PathBuf,
    /// Declared dialect tag; routes SQL text generation, not the driver.
    pub dialect: Dialect,
    pub wal_mode: bool,
    pub busy_timeout_ms: u64,
    pub cache_size_pages: i32,
}

impl CatalogConfig {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            db_path: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("catalog.sqlite3"),
            dialect: Dialect::Sqlite,
            wal_mode: true,
            busy_timeout_ms: 5_000,
            cache_size_pages: 2_000,
        }
    }
}

/// One catalog session: a single connection plus the mutex that serialises
/// whole browser operations against other users of the session.
///
/// The connection itself is single-threaded; callers wanting parallelism
/// open one `Catalog` per thread or share this one behind its operation
/// lock.
pub struct Catalog {
    conn: Connection,
    config: CatalogConfig,
    metrics: CatalogMetrics,
    operation_lock: Mutex<()>,
}

static FILE_BOOTSTRAP_LOCK: Mutex<()> = Mutex::new(());

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("path", &self.config.db_path)
            .field("dialect", &self.config.dialect)
            .field("wal_mode", &self.config.wal_mode)
            .finish_non_exhaustive()
    }
}

impl Catalog {
    pub fn open(config: CatalogConfig) -> BvfsResult<Self> {
        tracing::debug!(
            target: "bvfs.catalog",
            path = %config.db_path.display(),
            dialect = config.dialect.as_str(),
            wal_mode = config.wal_mode,
            busy_timeout_ms = config.busy_timeout_ms,
            "opening catalog session"
        );

        let file_bootstrap_guard = if config.db_path.as_os_str() == ":memory:" {
            None
        } else {
            Some(
                FILE_BOOTSTRAP_LOCK
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            )
        };

        let path = config.db_path.to_string_lossy().to_string();
        let conn = Connection::open(path).map_err(|e| BvfsError::catalog("open", e))?;

        let catalog = Self {
            conn,
            config,
            metrics: CatalogMetrics::default(),
            operation_lock: Mutex::new(()),
        };

        catalog.metrics.record_open();
        catalog.apply_pragmas()?;
        schema::bootstrap(catalog.connection())?;
        catalog.metrics.record_schema_bootstrap();
        drop(file_bootstrap_guard);

        Ok(catalog)
    }

    pub fn open_in_memory() -> BvfsResult<Self> {
        Self::open(CatalogConfig::in_memory())
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> CatalogMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Serialise a whole browser operation against other users of this
    /// session. Held across every round-trip the operation makes.
    #[must_use]
    pub fn lock_session(&self) -> MutexGuard<'_, ()> {
        self.operation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a closure inside a `BEGIN`/`COMMIT` transaction, rolling back on
    /// error or panic.
    pub fn transaction<F, T>(&self, f: F) -> BvfsResult<T>
    where
        F: FnOnce(&Connection) -> BvfsResult<T>,
    {
        self.transaction_with_mode("BEGIN;", f)
    }

    /// Run a closure inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// Unlike [`Catalog::transaction`], this acquires a write lock up front,
    /// so correctness-critical read-then-write sequences (the `HasCache`
    /// claim) cannot interleave with a concurrent writer.
    pub fn immediate_transaction<F, T>(&self, f: F) -> BvfsResult<T>
    where
        F: FnOnce(&Connection) -> BvfsResult<T>,
    {
        self.transaction_with_mode("BEGIN IMMEDIATE;", f)
    }

    fn transaction_with_mode<F, T>(&self, begin_sql: &str, f: F) -> BvfsResult<T>
    where
        F: FnOnce(&Connection) -> BvfsResult<T>,
    {
        tracing::trace!(target: "bvfs.catalog", begin_sql, "starting catalog transaction");

        self.conn
            .execute(begin_sql)
            .map_err(|e| BvfsError::catalog("tx.begin", e))?;

        let outcome = catch_unwind(AssertUnwindSafe(|| f(&self.conn)));

        match outcome {
            Ok(Ok(value)) => {
                self.conn.execute("COMMIT;").map_err(|commit_err| {
                    let _ = self.conn.execute("ROLLBACK;");
                    BvfsError::catalog("tx.commit", commit_err)
                })?;
                self.metrics.record_commit();
                Ok(value)
            }
            Ok(Err(err)) => {
                let _ = self.conn.execute("ROLLBACK;");
                self.metrics.record_rollback();
                tracing::debug!(
                    target: "bvfs.catalog",
                    ?err,
                    "catalog transaction rolled back due to closure error"
                );
                Err(err)
            }
            Err(payload) => {
                let _ = self.conn.execute("ROLLBACK;");
                self.metrics.record_rollback();
                tracing::error!(
                    target: "bvfs.catalog",
                    "catalog transaction rolled back after panic"
                );
                resume_unwind(payload);
            }
        }
    }

    fn apply_pragmas(&self) -> BvfsResult<()> {
        self.conn
            .execute("PRAGMA foreign_keys=ON;")
            .map_err(|e| BvfsError::catalog("pragma", e))?;

        if self.config.wal_mode {
            self.conn
                .execute("PRAGMA journal_mode=WAL;")
                .map_err(|e| BvfsError::catalog("pragma", e))?;
        }

        self.conn
            .execute(&format!(
                "PRAGMA busy_timeout={};",
                self.config.busy_timeout_ms
            ))
            .map_err(|e| BvfsError::catalog("pragma", e))?;

        self.conn
            .execute(&format!(
                "PRAGMA cache_size={};",
                self.config.cache_size_pages
            ))
            .map_err(|e| BvfsError::catalog("pragma", e))?;

        Ok(())
    }
}

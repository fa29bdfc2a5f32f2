/// Unified error type covering every failure mode in the bvfs workspace.
///
/// Catalog failures carry the operation tag that failed so a caller can tell
/// a claim probe apart from a listing query. `Busy` and `NotFound` are
/// ordinary outcomes for some callers (the cache refresher treats `Busy` as
/// success without work); they are still dedicated variants so nothing
/// swallows them by accident.
#[derive(Debug, thiserror::Error)]
pub enum BvfsError {
    /// A catalog round-trip failed (SQL error, driver error, or I/O).
    #[error("catalog error during {op}: {source}")]
    Catalog {
        /// Which catalog operation failed (e.g. `"hierarchy.claim"`).
        op: &'static str,
        /// The underlying driver error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A caller-supplied value violates the operation's contract.
    #[error("invalid argument: {field} = {value:?}: {reason}")]
    InvalidArgument {
        /// Which argument was rejected.
        field: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The job's cache is already being refreshed by another session.
    #[error("job {job_id} cache refresh already in progress; retry later or clear the cache")]
    Busy {
        /// The contended job.
        job_id: i64,
    },

    /// A referenced catalog record does not exist.
    #[error("{entity} record not found for key {key:?}")]
    NotFound {
        /// Which catalog entity was looked up (e.g. `"Path"`).
        entity: &'static str,
        /// The key that missed.
        key: String,
    },

    /// A cancellation request was observed at a catalog round-trip boundary.
    #[error("operation cancelled during {phase}")]
    Cancelled {
        /// Which phase was active when the token fired.
        phase: &'static str,
    },

    /// Wraps `std::io::Error` for file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the bvfs crate hierarchy.
pub type BvfsResult<T> = Result<T, BvfsError>;

impl BvfsError {
    /// Wrap a driver error with the catalog operation that produced it.
    pub fn catalog<E>(op: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Catalog {
            op,
            source: Box::new(source),
        }
    }

    /// Shorthand for [`BvfsError::InvalidArgument`].
    pub fn invalid_argument(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`BvfsError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BvfsError>();
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BvfsError = io_err.into();
        assert!(matches!(err, BvfsError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn catalog_error_preserves_source() {
        let inner = std::io::Error::other("db locked");
        let err = BvfsError::catalog("hierarchy.claim", inner);
        assert!(err.to_string().contains("hierarchy.claim"));
        assert!(err.to_string().contains("db locked"));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_argument_display() {
        let err = BvfsError::invalid_argument("dirid", "1,x,3", "not a number");
        let msg = err.to_string();
        assert!(msg.contains("dirid"));
        assert!(msg.contains("1,x,3"));
        assert!(msg.contains("not a number"));
    }

    #[test]
    fn busy_names_the_job() {
        let err = BvfsError::Busy { job_id: 42 };
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("in progress"));
    }

    #[test]
    fn not_found_display() {
        let err = BvfsError::not_found("Path", "/gone/");
        let msg = err.to_string();
        assert!(msg.contains("Path"));
        assert!(msg.contains("/gone/"));
    }

    #[test]
    fn cancelled_names_the_phase() {
        let err = BvfsError::Cancelled {
            phase: "visibility_closure",
        };
        assert!(err.to_string().contains("visibility_closure"));
    }
}

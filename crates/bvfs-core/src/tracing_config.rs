//! Tracing conventions for the bvfs workspace.
//!
//! The library never installs a subscriber; it only emits events under a
//! stable target prefix so consumers can filter them:
//!
//! ```text
//! RUST_LOG=bvfs=debug
//! ```

use tracing::Level;

/// Target prefix used by all bvfs tracing events.
pub const TARGET_PREFIX: &str = "bvfs";

/// Standard span names used across the catalog browser.
///
/// Kept as constants so subscribers, dashboards, and tests can match on
/// them without string drift.
pub mod span_names {
    /// One full cache-maintenance pass over eligible jobs.
    pub const CACHE_UPDATE: &str = "bvfs::cache_update";
    /// Hierarchy/visibility refresh of a single job.
    pub const JOB_REFRESH: &str = "bvfs::job_refresh";
    /// Upward walk materialising hierarchy edges for one path.
    pub const HIERARCHY_BUILD: &str = "bvfs::hierarchy_build";
    /// Directory listing under the current directory.
    pub const LS_DIRS: &str = "bvfs::ls_dirs";
    /// File listing under the current directory.
    pub const LS_FILES: &str = "bvfs::ls_files";
    /// Version enumeration for one file.
    pub const VERSIONS: &str = "bvfs::versions";
    /// Restore-selection compilation into a `b2*` table.
    pub const RESTORE_LIST: &str = "bvfs::restore_list";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Returns the recommended `tracing::Level` for the given environment.
///
/// Checks `BVFS_LOG_LEVEL` first, then falls back to the provided default.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("BVFS_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_prefix_is_bvfs() {
        assert_eq!(TARGET_PREFIX, "bvfs");
    }

    #[test]
    fn all_span_names_start_with_target_prefix() {
        let all_spans = [
            span_names::CACHE_UPDATE,
            span_names::JOB_REFRESH,
            span_names::HIERARCHY_BUILD,
            span_names::LS_DIRS,
            span_names::LS_FILES,
            span_names::VERSIONS,
            span_names::RESTORE_LIST,
        ];
        for span in all_spans {
            assert!(
                span.starts_with(&format!("{TARGET_PREFIX}::")),
                "span {span:?} must start with \"{TARGET_PREFIX}::\"",
            );
        }
    }

    #[test]
    fn parse_level_recognizes_valid_levels() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("info"), Some(Level::INFO));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("error"), Some(Level::ERROR));
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level("Warn"), Some(Level::WARN));
    }

    #[test]
    fn parse_level_returns_none_for_invalid() {
        assert_eq!(parse_level("nonsense"), None);
        assert_eq!(parse_level(""), None);
        assert_eq!(parse_level(" info"), None);
    }
}

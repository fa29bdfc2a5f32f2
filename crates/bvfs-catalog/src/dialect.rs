//! SQL dialect branch points.
//!
//! The engine composes most statements textually (the restore union has an
//! input-dependent number of branches), so every place where backends differ
//! is routed through this one type instead of scattering `if dialect`
//! checks: literal escaping, LIKE escaping, pattern matching, cache-table
//! clearing, and the newest-version apex strategy.

use serde::{Deserialize, Serialize};

/// Declared dialect tag of a catalog session.
///
/// The embedded backend always speaks SQLite; the other tags describe
/// catalogs reached through compatible session plumbing and only change the
/// SQL text this workspace generates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
    Generic,
}

impl Dialect {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Generic => "generic",
        }
    }

    /// Escape `raw` for inclusion inside a single-quoted SQL literal.
    #[must_use]
    pub fn escape_string(self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '\'' => out.push_str("''"),
                // MySQL treats backslash as an escape inside literals.
                '\\' if matches!(self, Self::Mysql) => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out
    }

    /// Escape the LIKE metacharacters `%`, `_`, and `\` with a backslash.
    ///
    /// Pair the result with [`Dialect::like_escape_clause`] so the backend
    /// agrees on the escape character.
    #[must_use]
    pub fn escape_like(self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            if matches!(c, '%' | '_' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    /// The `ESCAPE` clause matching [`Dialect::escape_like`].
    ///
    /// MySQL already defaults to backslash escaping; the others need it
    /// spelled out.
    #[must_use]
    pub const fn like_escape_clause(self) -> &'static str {
        match self {
            Self::Mysql => "",
            Self::Sqlite | Self::Postgres | Self::Generic => " ESCAPE '\\'",
        }
    }

    /// Pattern filter over a column, using the backend's matching operator.
    ///
    /// `escaped_pattern` must already have gone through
    /// [`Dialect::escape_string`].
    #[must_use]
    pub fn match_clause(self, column: &str, escaped_pattern: &str) -> String {
        match self {
            Self::Sqlite => format!("{column} GLOB '{escaped_pattern}'"),
            Self::Mysql => format!("{column} REGEXP '{escaped_pattern}'"),
            Self::Postgres => format!("{column} ~ '{escaped_pattern}'"),
            Self::Generic => format!("{column} LIKE '{escaped_pattern}'"),
        }
    }

    /// Empty a cache table the fastest way the backend allows.
    #[must_use]
    pub fn clear_table_sql(self, table: &str) -> String {
        match self {
            Self::Sqlite | Self::Generic => format!("DELETE FROM {table};"),
            Self::Mysql | Self::Postgres => format!("TRUNCATE {table};"),
        }
    }

    /// Whether the backend supports `DISTINCT ON`, letting a newest-version
    /// apex be expressed in one ordered pass instead of a max-subquery.
    #[must_use]
    pub const fn supports_distinct_on(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Whether a freshly created restore table needs an explicit JobId index.
    #[must_use]
    pub const fn wants_restore_jobid_index(self) -> bool {
        matches!(self, Self::Mysql)
    }
}

//! Catalog session plumbing for the bvfs browser.
//!
//! This crate owns the connection to the relational catalog: transaction
//! management, SQL dialect branch points, schema bootstrap for embedded and
//! test deployments, `Path` record upsert/lookup, and session metrics. The
//! browsing engine in the `bvfs` crate talks to the catalog exclusively
//! through these types.

pub mod connection;
pub mod dialect;
pub mod metrics;
pub mod paths;
pub mod row;
pub mod schema;

pub use connection::{Catalog, CatalogConfig};
pub use dialect::Dialect;
pub use metrics::{CatalogMetrics, CatalogMetricsSnapshot};
pub use paths::{create_path_record, get_path_record, path_of};
pub use row::{row_i64, row_opt_i64, row_opt_text, row_text};
pub use schema::{SCHEMA_VERSION, bootstrap, current_version};

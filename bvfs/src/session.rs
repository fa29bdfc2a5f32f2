//! The stateful browsing session.
//!
//! A session carries the job scope, current directory, name pattern,
//! pagination window, and version/copy flags that every listing and
//! restore operation reads. It owns a handle to one catalog session and a
//! cancellation token checked at round-trip boundaries.

use std::sync::Arc;

use bvfs_catalog::{Catalog, get_path_record};
use bvfs_core::{BvfsError, BvfsResult, CancelToken, JobId, PathId, parse_id_list};

use crate::maintenance::{self, MaintenanceSummary};

/// Default pagination window.
pub const DEFAULT_LIMIT: u64 = 1_000;

pub struct BvfsSession {
    catalog: Arc<Catalog>,
    job_ids: Vec<JobId>,
    pwd_id: PathId,
    pattern: Option<String>,
    limit: u64,
    offset: u64,
    see_copies: bool,
    see_all_versions: bool,
    cancel: CancelToken,
    /// Last directory emitted by a lister; the stream-dedup state.
    pub(crate) prev_dir: String,
}

impl BvfsSession {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            job_ids: Vec::new(),
            pwd_id: 0,
            pattern: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            see_copies: false,
            see_all_versions: false,
            cancel: CancelToken::new(),
            prev_dir: String::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// Scope all listings to a single job.
    pub fn set_job_id(&mut self, job_id: JobId) {
        self.job_ids = vec![job_id];
    }

    /// Scope all listings to a comma-separated job id list.
    pub fn set_job_ids(&mut self, ids: &str) -> BvfsResult<()> {
        self.job_ids = parse_id_list(ids, "jobids")?;
        Ok(())
    }

    #[must_use]
    pub fn job_ids(&self) -> &[JobId] {
        &self.job_ids
    }

    /// The job scope rendered for an SQL `IN (...)` list.
    ///
    /// Safe to interpolate: every element came through the numeric parser.
    #[must_use]
    pub(crate) fn job_ids_sql(&self) -> String {
        join_ids(&self.job_ids)
    }

    pub fn set_pattern(&mut self, pattern: Option<&str>) {
        self.pattern = pattern.map(str::to_owned);
    }

    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn set_see_copies(&mut self, see_copies: bool) {
        self.see_copies = see_copies;
    }

    #[must_use]
    pub fn see_copies(&self) -> bool {
        self.see_copies
    }

    pub fn set_see_all_versions(&mut self, see_all_versions: bool) {
        self.see_all_versions = see_all_versions;
    }

    #[must_use]
    pub fn see_all_versions(&self) -> bool {
        self.see_all_versions
    }

    /// Current directory; 0 means unset.
    #[must_use]
    pub fn pwd_id(&self) -> PathId {
        self.pwd_id
    }

    /// Change directory to a known `PathId` without touching the catalog.
    pub fn ch_dir_id(&mut self, path_id: PathId) {
        self.pwd_id = path_id;
    }

    /// Change directory by path string. Returns whether the path exists;
    /// the current directory is left unchanged when it does not.
    pub fn ch_dir(&mut self, path: &str) -> BvfsResult<bool> {
        let catalog = Arc::clone(&self.catalog);
        let _session = catalog.lock_session();
        match get_path_record(catalog.connection(), path) {
            Ok(path_id) => {
                self.pwd_id = path_id;
                Ok(true)
            }
            Err(BvfsError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// `PathId` of the root (empty) path.
    pub fn root(&self) -> BvfsResult<PathId> {
        let _session = self.catalog.lock_session();
        get_path_record(self.catalog.connection(), "")
    }

    /// Refresh the hierarchy/visibility cache for exactly this session's
    /// job scope.
    pub fn update_cache(&self) -> BvfsResult<MaintenanceSummary> {
        maintenance::update_cache_for_jobs(&self.catalog, &self.cancel, &self.job_ids)
    }
}

impl std::fmt::Debug for BvfsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BvfsSession")
            .field("job_ids", &self.job_ids)
            .field("pwd_id", &self.pwd_id)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Render ids for an SQL `IN (...)` list.
pub(crate) fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bvfs_catalog::create_path_record;

    fn session() -> BvfsSession {
        let catalog = Arc::new(Catalog::open_in_memory().expect("open catalog"));
        BvfsSession::new(catalog)
    }

    #[test]
    fn defaults_match_contract() {
        let session = session();
        assert_eq!(session.limit(), 1_000);
        assert_eq!(session.offset(), 0);
        assert_eq!(session.pwd_id(), 0);
        assert!(session.job_ids().is_empty());
        assert!(!session.see_copies());
        assert!(!session.see_all_versions());
    }

    #[test]
    fn job_id_list_round_trips_to_sql() {
        let mut session = session();
        session.set_job_ids("3,1,9").expect("valid list");
        assert_eq!(session.job_ids(), &[3, 1, 9]);
        assert_eq!(session.job_ids_sql(), "3,1,9");

        session.set_job_id(42);
        assert_eq!(session.job_ids_sql(), "42");
    }

    #[test]
    fn malformed_job_id_list_is_rejected() {
        let mut session = session();
        assert!(session.set_job_ids("1,x").is_err());
    }

    #[test]
    fn ch_dir_resolves_existing_path() {
        let mut session = session();
        let path_id = {
            let conn = session.catalog().connection();
            create_path_record(conn, "/srv/data/").expect("create path")
        };

        assert!(session.ch_dir("/srv/data/").expect("ch_dir"));
        assert_eq!(session.pwd_id(), path_id);
    }

    #[test]
    fn ch_dir_missing_path_reports_false_and_keeps_pwd() {
        let mut session = session();
        session.ch_dir_id(17);
        assert!(!session.ch_dir("/missing/").expect("ch_dir"));
        assert_eq!(session.pwd_id(), 17);
    }

    #[test]
    fn root_resolves_empty_path_record() {
        let session = session();
        let root_id = {
            let conn = session.catalog().connection();
            create_path_record(conn, "").expect("create root")
        };
        assert_eq!(session.root().expect("root"), root_id);
    }

    #[test]
    fn join_ids_renders_in_list() {
        assert_eq!(join_ids(&[1, 2, 3]), "1,2,3");
        assert_eq!(join_ids(&[]), "");
    }
}

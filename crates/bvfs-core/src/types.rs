//! Identifier aliases and the row types emitted to listing sinks.

use serde::{Deserialize, Serialize};

/// Catalog surrogate key for a job.
pub type JobId = i64;
/// Catalog surrogate key for a directory path.
pub type PathId = i64;
/// Catalog surrogate key for a file row.
pub type FileId = i64;

/// Job classification, stored in the catalog as a one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    /// A regular backup job.
    Backup,
    /// A copy of another job's data.
    Copy,
}

impl JobType {
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Backup => 'B',
            Self::Copy => 'C',
        }
    }

    #[must_use]
    pub fn from_char(code: char) -> Option<Self> {
        match code {
            'B' => Some(Self::Backup),
            'C' => Some(Self::Copy),
            _ => None,
        }
    }
}

/// One visible directory under the current directory.
///
/// The attribute columns come from a left join against the directory's own
/// `File` row (`Name = ''`); they are `None` when no job in scope captured
/// the directory entry itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub path_id: PathId,
    /// Full catalog path, or the literal `"."`/`".."` for special entries.
    pub path: String,
    pub job_id: Option<JobId>,
    pub lstat: Option<String>,
    pub file_id: Option<FileId>,
}

/// One file leaf under the current directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path_id: PathId,
    pub name: String,
    pub job_id: JobId,
    pub lstat: String,
    pub file_id: FileId,
    pub file_index: i64,
}

/// One catalogued version of a file, across jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub job_id: JobId,
    pub file_id: FileId,
    pub job_tdate: i64,
    pub lstat: String,
    pub md5: Option<String>,
    pub volume_name: Option<String>,
}

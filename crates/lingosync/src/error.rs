use std::path::PathBuf;
use thiserror::Error;

use crate::format::FormatError;

/// Which representation of a store should be trusted when recovering from a failure.
///
/// The projection rows and the search index are both derived from the file, so
/// the answer is always the file. The type exists so callers can report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    File,
    Projection,
    Index,
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authority::File => write!(f, "file"),
            Authority::Projection => write!(f, "database"),
            Authority::Index => write!(f, "index"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is missing: {0}")]
    Missing(PathBuf),

    #[error("Version control error: {0}")]
    Vcs(#[from] crate::vcs::VcsError),

    #[error("Permission denied: {principal} may not {action} {path}")]
    PermissionDenied {
        principal: String,
        action: String,
        path: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid unit selector: {0}")]
    InvalidSelector(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),

    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Maps an `io::Error` raised while touching `path`, turning a vanished file into
    /// [`SyncError::Missing`] so the project can rescan its directory.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            SyncError::Missing(path.to_path_buf())
        } else {
            SyncError::Io(err)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SyncError::Missing(_))
    }

    pub fn authority(&self) -> Authority {
        Authority::File
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

//! Version control capability.
//!
//! The engine never runs a VCS itself. A project is handed something that
//! can refresh a file from upstream and commit a file back; the update and
//! commit workflows live in [`crate::project`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("{path} is not under version control")]
    NotVersioned { path: PathBuf },

    #[error("Update of {path} failed: {message}")]
    UpdateFailed { path: PathBuf, message: String },

    #[error("Commit of {path} failed: {message}")]
    CommitFailed { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait VersionControl: Send + Sync {
    /// Replaces the working copy of `path` with the upstream version.
    fn update_file(&self, path: &Path) -> Result<(), VcsError>;

    fn commit_file(&self, path: &Path, message: &str, author: Option<&str>) -> Result<(), VcsError>;
}

impl<T: VersionControl + ?Sized> VersionControl for std::sync::Arc<T> {
    fn update_file(&self, path: &Path) -> Result<(), VcsError> {
        (**self).update_file(path)
    }

    fn commit_file(&self, path: &Path, message: &str, author: Option<&str>) -> Result<(), VcsError> {
        (**self).commit_file(path, message, author)
    }
}

/// A commit recorded by [`MemVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub path: PathBuf,
    pub message: String,
    pub author: Option<String>,
    pub content: Vec<u8>,
}

/// In-process repository: upstream content is set per path, commits are recorded.
///
/// Used by tests and by callers wiring the engine without a real VCS.
#[derive(Debug, Default)]
pub struct MemVcs {
    upstream: Mutex<HashMap<PathBuf, Vec<u8>>>,
    commits: Mutex<Vec<Commit>>,
    fail_updates: Mutex<bool>,
}

impl MemVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_upstream(&self, path: &Path, content: impl Into<Vec<u8>>) {
        self.upstream.lock().insert(path.to_path_buf(), content.into());
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *self.fail_updates.lock() = fail;
    }

    pub fn commits(&self) -> Vec<Commit> {
        self.commits.lock().clone()
    }
}

impl VersionControl for MemVcs {
    fn update_file(&self, path: &Path) -> Result<(), VcsError> {
        if *self.fail_updates.lock() {
            // Simulate an upstream that clobbers the file and then errors out.
            fs::write(path, b"partial")?;
            return Err(VcsError::UpdateFailed {
                path: path.to_path_buf(),
                message: "simulated failure".to_string(),
            });
        }
        let upstream = self.upstream.lock();
        let content = upstream.get(path).ok_or_else(|| VcsError::NotVersioned {
            path: path.to_path_buf(),
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    fn commit_file(&self, path: &Path, message: &str, author: Option<&str>) -> Result<(), VcsError> {
        let content = fs::read(path)?;
        self.upstream.lock().insert(path.to_path_buf(), content.clone());
        self.commits.lock().push(Commit {
            path: path.to_path_buf(),
            message: message.to_string(),
            author: author.map(str::to_string),
            content,
        });
        Ok(())
    }
}

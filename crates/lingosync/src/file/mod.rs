//! # Files on Disk
//!
//! The translation file is the source of truth. Everything else (projection
//! rows, statistics, the search index) is derived from it and can be rebuilt.
//!
//! - [`handle::FileHandle`]: one parsed file, its fingerprint and atomic saves.
//! - [`cache::FileCache`]: bounded LRU of shared handles with pinning.
//!
//! Every persisted artifact in the crate goes through [`write_atomic`]: a
//! temporary file in the destination directory renamed over the target, so a
//! reader sees either the old bytes or the new bytes.

use crate::error::{Result, SyncError};
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub mod cache;
pub mod handle;

pub use cache::{FileCache, PinGuard, SharedHandle};
pub use handle::FileHandle;

/// Writes `bytes` to `path` through a sibling temporary file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(SyncError::Io)?;
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SyncError::Store(format!("Invalid file path: {}", path.display())))?;

    let tmp = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(SyncError::Io(e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(SyncError::Io(e));
    }
    Ok(())
}

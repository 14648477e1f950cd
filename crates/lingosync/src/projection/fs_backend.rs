use super::backend::ProjectionBackend;
use super::row::UnitRow;
use crate::error::{Result, SyncError};
use crate::file::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize)]
struct StoreDocument {
    pootle_path: String,
    rows: Vec<UnitRow>,
}

#[derive(Deserialize)]
struct StoreHeader {
    pootle_path: String,
}

/// One JSON document per store under the database directory, named after a
/// hash of the store's logical path.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, store: &str) -> PathBuf {
        let hash = blake3::hash(store.as_bytes()).to_hex();
        self.root.join(format!("store-{}.json", &hash[..16]))
    }
}

impl ProjectionBackend for FsBackend {
    fn load_rows(&self, store: &str) -> Result<Vec<UnitRow>> {
        let path = self.document_path(store);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).map_err(SyncError::Io)?;
        let doc: StoreDocument = serde_json::from_str(&content).map_err(SyncError::Serialization)?;
        if doc.pootle_path != store {
            return Err(SyncError::Store(format!(
                "Row document {} belongs to {}, expected {}",
                path.display(),
                doc.pootle_path,
                store
            )));
        }
        Ok(doc.rows)
    }

    fn save_rows(&self, store: &str, rows: &[UnitRow]) -> Result<()> {
        let doc = StoreDocument {
            pootle_path: store.to_string(),
            rows: rows.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&doc).map_err(SyncError::Serialization)?;
        write_atomic(&self.document_path(store), &content)
    }

    fn delete_rows(&self, store: &str) -> Result<()> {
        let path = self.document_path(store);
        if path.exists() {
            fs::remove_file(path).map_err(SyncError::Io)?;
        }
        Ok(())
    }

    fn list_stores(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut stores = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(SyncError::Io)? {
            let entry = entry.map_err(SyncError::Io)?;
            let path = entry.path();
            let is_doc = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with("store-") && n.ends_with(".json"));
            if !is_doc {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(SyncError::Io)?;
            let header: StoreHeader =
                serde_json::from_str(&content).map_err(SyncError::Serialization)?;
            stores.push(header.pootle_path);
        }
        stores.sort();
        Ok(stores)
    }
}

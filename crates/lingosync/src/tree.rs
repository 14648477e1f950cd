//! # Directory Tree
//!
//! The logical hierarchy of a project: directories holding stores, with a
//! single root. Nodes live in an arena and refer to each other by id, so a
//! node's `pootle_path` is never stored; it is derived from the parent chain
//! each time it is asked for:
//!
//! - root: the project prefix, e.g. `/sw/demo/`
//! - directory: `parent + name + "/"`
//! - store: `parent + name`
//!
//! Renaming or moving a directory therefore changes the paths of everything
//! below it without touching the descendants. Real paths follow the same
//! rule from the root's real path; the tree mirrors the disk.
//!
//! [`DirectoryTree::scan`] reconciles a directory with the filesystem: new
//! translation files become stores, vanished ones are removed. Hidden
//! entries (the index and database directories included) and side files are
//! skipped.

use crate::error::{Result, SyncError};
use crate::format::is_translation_file;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(usize);

#[derive(Debug)]
struct DirNode {
    name: String,
    parent: Option<DirId>,
    dirs: BTreeMap<String, DirId>,
    stores: BTreeMap<String, StoreId>,
}

#[derive(Debug)]
struct StoreNode {
    name: String,
    parent: DirId,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub added_stores: Vec<String>,
    pub removed_stores: Vec<String>,
    pub added_dirs: Vec<String>,
    pub removed_dirs: Vec<String>,
}

impl ScanReport {
    pub fn changed(&self) -> bool {
        !(self.added_stores.is_empty()
            && self.removed_stores.is_empty()
            && self.added_dirs.is_empty()
            && self.removed_dirs.is_empty())
    }
}

#[derive(Debug)]
pub struct DirectoryTree {
    root_path: String,
    root_real: PathBuf,
    dirs: Vec<Option<DirNode>>,
    stores: Vec<Option<StoreNode>>,
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(SyncError::Store(format!("Invalid node name: {:?}", name)));
    }
    Ok(())
}

impl DirectoryTree {
    /// A tree whose root is `pootle_path` (normalized to `/.../`) backed by `real_path`.
    pub fn new(pootle_path: &str, real_path: impl Into<PathBuf>) -> Self {
        let trimmed = pootle_path.trim_matches('/');
        let root_path = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };
        Self {
            root_path,
            root_real: real_path.into(),
            dirs: vec![Some(DirNode {
                name: String::new(),
                parent: None,
                dirs: BTreeMap::new(),
                stores: BTreeMap::new(),
            })],
            stores: Vec::new(),
        }
    }

    pub fn root(&self) -> DirId {
        DirId(0)
    }

    fn dir(&self, id: DirId) -> Result<&DirNode> {
        self.dirs
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| SyncError::NotFound(format!("directory #{}", id.0)))
    }

    fn dir_mut(&mut self, id: DirId) -> Result<&mut DirNode> {
        self.dirs
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| SyncError::NotFound(format!("directory #{}", id.0)))
    }

    fn store(&self, id: StoreId) -> Result<&StoreNode> {
        self.stores
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| SyncError::NotFound(format!("store #{}", id.0)))
    }

    /// Names from the root (exclusive) down to `id` (inclusive).
    fn dir_chain(&self, id: DirId) -> Result<Vec<&str>> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(dir_id) = current {
            let node = self.dir(dir_id)?;
            if node.parent.is_some() {
                chain.push(node.name.as_str());
            }
            current = node.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn dir_pootle_path(&self, id: DirId) -> Result<String> {
        let mut path = self.root_path.clone();
        for name in self.dir_chain(id)? {
            path.push_str(name);
            path.push('/');
        }
        Ok(path)
    }

    pub fn dir_real_path(&self, id: DirId) -> Result<PathBuf> {
        let mut path = self.root_real.clone();
        for name in self.dir_chain(id)? {
            path.push(name);
        }
        Ok(path)
    }

    pub fn store_pootle_path(&self, id: StoreId) -> Result<String> {
        let node = self.store(id)?;
        Ok(format!("{}{}", self.dir_pootle_path(node.parent)?, node.name))
    }

    pub fn store_real_path(&self, id: StoreId) -> Result<PathBuf> {
        let node = self.store(id)?;
        Ok(self.dir_real_path(node.parent)?.join(&node.name))
    }

    pub fn store_parent(&self, id: StoreId) -> Result<DirId> {
        Ok(self.store(id)?.parent)
    }

    pub fn child_dirs(&self, id: DirId) -> Result<Vec<DirId>> {
        Ok(self.dir(id)?.dirs.values().copied().collect())
    }

    pub fn child_stores(&self, id: DirId) -> Result<Vec<StoreId>> {
        Ok(self.dir(id)?.stores.values().copied().collect())
    }

    /// Every store at or below `id`, depth first.
    pub fn stores_under(&self, id: DirId) -> Result<Vec<StoreId>> {
        let mut out = self.child_stores(id)?;
        for child in self.child_dirs(id)? {
            out.extend(self.stores_under(child)?);
        }
        Ok(out)
    }

    pub fn all_stores(&self) -> Vec<StoreId> {
        self.stores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| StoreId(i))
            .collect()
    }

    fn is_descendant(&self, candidate: DirId, ancestor: DirId) -> Result<bool> {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.dir(id)?.parent;
        }
        Ok(false)
    }

    fn ensure_free(&self, parent: DirId, name: &str) -> Result<()> {
        let node = self.dir(parent)?;
        if node.dirs.contains_key(name) || node.stores.contains_key(name) {
            return Err(SyncError::Store(format!(
                "{}{} already exists",
                self.dir_pootle_path(parent)?,
                name
            )));
        }
        Ok(())
    }

    pub fn add_dir(&mut self, parent: DirId, name: &str) -> Result<DirId> {
        check_name(name)?;
        self.ensure_free(parent, name)?;
        let id = DirId(self.dirs.len());
        self.dirs.push(Some(DirNode {
            name: name.to_string(),
            parent: Some(parent),
            dirs: BTreeMap::new(),
            stores: BTreeMap::new(),
        }));
        self.dir_mut(parent)?.dirs.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_store(&mut self, parent: DirId, name: &str) -> Result<StoreId> {
        check_name(name)?;
        self.ensure_free(parent, name)?;
        let id = StoreId(self.stores.len());
        self.stores.push(Some(StoreNode {
            name: name.to_string(),
            parent,
        }));
        self.dir_mut(parent)?.stores.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn rename_dir(&mut self, id: DirId, new_name: &str) -> Result<()> {
        check_name(new_name)?;
        let (old_name, parent) = {
            let node = self.dir(id)?;
            let parent = node
                .parent
                .ok_or_else(|| SyncError::Store("The root directory cannot be renamed".to_string()))?;
            (node.name.clone(), parent)
        };
        if old_name == new_name {
            return Ok(());
        }
        self.ensure_free(parent, new_name)?;
        let parent_node = self.dir_mut(parent)?;
        parent_node.dirs.remove(&old_name);
        parent_node.dirs.insert(new_name.to_string(), id);
        self.dir_mut(id)?.name = new_name.to_string();
        Ok(())
    }

    /// Re-parents `id` under `new_parent`. Moving a directory below itself is refused.
    pub fn move_dir(&mut self, id: DirId, new_parent: DirId) -> Result<()> {
        let (name, old_parent) = {
            let node = self.dir(id)?;
            let parent = node
                .parent
                .ok_or_else(|| SyncError::Store("The root directory cannot be moved".to_string()))?;
            (node.name.clone(), parent)
        };
        if old_parent == new_parent {
            return Ok(());
        }
        if self.is_descendant(new_parent, id)? {
            return Err(SyncError::Store(format!(
                "Cannot move {} into its own subtree",
                self.dir_pootle_path(id)?
            )));
        }
        self.ensure_free(new_parent, &name)?;
        self.dir_mut(old_parent)?.dirs.remove(&name);
        self.dir_mut(new_parent)?.dirs.insert(name, id);
        self.dir_mut(id)?.parent = Some(new_parent);
        Ok(())
    }

    /// Removes a store and returns the pootle path it had.
    pub fn remove_store(&mut self, id: StoreId) -> Result<String> {
        let path = self.store_pootle_path(id)?;
        let node = self.stores[id.0]
            .take()
            .ok_or_else(|| SyncError::NotFound(format!("store #{}", id.0)))?;
        self.dir_mut(node.parent)?.stores.remove(&node.name);
        Ok(path)
    }

    /// Removes `id` and everything below it. Returns the pootle paths of the removed stores.
    pub fn remove_dir(&mut self, id: DirId) -> Result<Vec<String>> {
        let parent = self
            .dir(id)?
            .parent
            .ok_or_else(|| SyncError::Store("The root directory cannot be removed".to_string()))?;
        let mut removed = Vec::new();
        for store in self.child_stores(id)? {
            removed.push(self.remove_store(store)?);
        }
        for child in self.child_dirs(id)? {
            removed.extend(self.remove_dir(child)?);
        }
        let name = self.dir(id)?.name.clone();
        self.dir_mut(parent)?.dirs.remove(&name);
        self.dirs[id.0] = None;
        Ok(removed)
    }

    pub fn find_dir(&self, pootle_path: &str) -> Option<DirId> {
        let rest = pootle_path.strip_prefix(self.root_path.as_str())?;
        let mut current = self.root();
        for name in rest.split('/').filter(|s| !s.is_empty()) {
            current = *self.dir(current).ok()?.dirs.get(name)?;
        }
        Some(current)
    }

    pub fn find_store(&self, pootle_path: &str) -> Option<StoreId> {
        let (dir_path, name) = pootle_path.rsplit_once('/')?;
        let dir = self.find_dir(&format!("{}/", dir_path))?;
        self.dir(dir).ok()?.stores.get(name).copied()
    }

    /// Reconciles `id` and its subdirectories with the filesystem.
    pub fn scan(&mut self, id: DirId, ignore_suffixes: &[&str]) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        self.scan_into(id, ignore_suffixes, &mut report)?;
        if report.changed() {
            debug!(
                dir = %self.dir_pootle_path(id)?,
                added = report.added_stores.len(),
                removed = report.removed_stores.len(),
                "directory rescanned"
            );
        }
        Ok(report)
    }

    fn scan_into(&mut self, id: DirId, ignore_suffixes: &[&str], report: &mut ScanReport) -> Result<()> {
        let real = self.dir_real_path(id)?;
        let mut seen_dirs = Vec::new();
        let mut seen_stores = Vec::new();

        let mut entries: Vec<_> = fs::read_dir(&real)
            .map_err(|e| SyncError::from_io(&real, e))?
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                let child = match self.dir(id)?.dirs.get(&name).copied() {
                    Some(existing) => existing,
                    None => {
                        let created = self.add_dir(id, &name)?;
                        report.added_dirs.push(self.dir_pootle_path(created)?);
                        created
                    }
                };
                seen_dirs.push(name);
                self.scan_into(child, ignore_suffixes, report)?;
            } else if is_translation_file(&path, ignore_suffixes) {
                if !self.dir(id)?.stores.contains_key(&name) {
                    let created = self.add_store(id, &name)?;
                    report.added_stores.push(self.store_pootle_path(created)?);
                }
                seen_stores.push(name);
            }
        }

        let node = self.dir(id)?;
        let vanished_stores: Vec<StoreId> = node
            .stores
            .iter()
            .filter(|(name, _)| !seen_stores.contains(*name))
            .map(|(_, id)| *id)
            .collect();
        let vanished_dirs: Vec<DirId> = node
            .dirs
            .iter()
            .filter(|(name, _)| !seen_dirs.contains(*name))
            .map(|(_, id)| *id)
            .collect();
        for store in vanished_stores {
            report.removed_stores.push(self.remove_store(store)?);
        }
        for dir in vanished_dirs {
            report.removed_dirs.push(self.dir_pootle_path(dir)?);
            report.removed_stores.extend(self.remove_dir(dir)?);
        }
        Ok(())
    }
}

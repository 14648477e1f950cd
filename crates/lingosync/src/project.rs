//! # Translation Project
//!
//! A directory of translation files under one logical prefix
//! (`/<language>/<project>/`). The project owns everything with session scope:
//! the directory tree, the [`Services`] (file cache, statistics cache,
//! projection, search index) and one lock per store.
//!
//! ## Locking
//!
//! Stores are kept as `Arc<Mutex<Store>>` keyed by pootle path. Every
//! operation on a store, merges and version-control updates included, runs
//! with that store's lock held. Different stores never wait on each other.
//!
//! ## Missing files
//!
//! When an operation fails because its file vanished, the project rescans
//! its tree before returning the error, so the store disappears from
//! listings and statistics.
//!
//! ## Version control
//!
//! [`TranslationProject::update_from_version_control`] keeps local work:
//!
//! 1. rows are synced to the file and the working copy is snapshotted,
//! 2. the file is updated from upstream, re-parsed and pulled,
//! 3. the snapshot is merged back with [`MergeOptions::version_merge`], so
//!    local translations that conflict become suggestions,
//! 4. on any failure the snapshot is restored.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::merge::{MergeOptions, MergeReport};
use crate::projection::{FsBackend, ProjectionBackend};
use crate::search::{SearchField, SearchHit};
use crate::stats::{self, stats_message, Counts, QuickStats};
use crate::store::{Services, Store};
use crate::tree::{DirId, DirectoryTree, ScanReport};
use crate::vcs::VersionControl;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Statistics around a version-control update of one store.
#[derive(Debug, Clone, Serialize)]
pub struct VcsUpdateReport {
    pub old: QuickStats,
    pub remote: QuickStats,
    pub merged: QuickStats,
    pub merge: MergeReport,
}

#[derive(Debug, Default, Serialize)]
pub struct ProjectUpdateReport {
    pub updated: Vec<(String, VcsUpdateReport)>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorReport {
    /// Rows whose unit no longer exists in the file.
    pub pruned_rows: usize,
    /// Stores with rows in the database but no file on disk.
    pub dropped_stores: Vec<String>,
    pub added_stores: Vec<String>,
}

impl DoctorReport {
    pub fn is_clean(&self) -> bool {
        self.pruned_rows == 0 && self.dropped_stores.is_empty() && self.added_stores.is_empty()
    }
}

pub struct TranslationProject<B: ProjectionBackend> {
    pootle_path: String,
    root: PathBuf,
    services: Services<B>,
    tree: RwLock<DirectoryTree>,
    stores: Mutex<HashMap<String, Arc<Mutex<Store>>>>,
}

impl TranslationProject<FsBackend> {
    /// Opens the project at `root`, reading `lingosync.toml` and keeping rows under `db_dir`.
    pub fn open_dir(root: &Path, pootle_path: &str) -> Result<Self> {
        let config = SyncConfig::load(root)?;
        let backend = FsBackend::new(root.join(&config.db_dir));
        Self::open(root, pootle_path, config, backend)
    }
}

impl<B: ProjectionBackend> TranslationProject<B> {
    pub fn open(root: &Path, pootle_path: &str, config: SyncConfig, backend: B) -> Result<Self> {
        if !root.is_dir() {
            return Err(SyncError::Missing(root.to_path_buf()));
        }
        let tree = DirectoryTree::new(pootle_path, root);
        let pootle_path = tree.dir_pootle_path(tree.root())?;
        let project = Self {
            pootle_path,
            root: root.to_path_buf(),
            services: Services::new(config, backend, root),
            tree: RwLock::new(tree),
            stores: Mutex::new(HashMap::new()),
        };
        project.rescan()?;
        Ok(project)
    }

    pub fn pootle_path(&self) -> &str {
        &self.pootle_path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn services(&self) -> &Services<B> {
        &self.services
    }

    pub fn config(&self) -> &SyncConfig {
        &self.services.config
    }

    /// Reconciles the tree with the disk and drops state of vanished stores.
    pub fn rescan(&self) -> Result<ScanReport> {
        let report = {
            let mut tree = self.tree.write();
            let root = tree.root();
            tree.scan(root, &self.services.config.side_suffixes())?
        };
        for path in &report.removed_stores {
            self.forget_store(path)?;
        }
        if report.changed() {
            info!(
                project = %self.pootle_path,
                added = report.added_stores.len(),
                removed = report.removed_stores.len(),
                "project rescanned"
            );
        }
        Ok(report)
    }

    fn forget_store(&self, pootle_path: &str) -> Result<()> {
        let entry = self.stores.lock().remove(pootle_path);
        match entry {
            Some(store) => store.lock().forget(&self.services),
            None => {
                self.services.projection.delete_store(pootle_path)?;
                self.services.stats.invalidate(pootle_path, stats::ALL_OPERATIONS);
                Ok(())
            }
        }
    }

    /// Pootle paths of every store, sorted.
    pub fn store_paths(&self) -> Result<Vec<String>> {
        self.store_paths_under(&self.pootle_path)
    }

    pub fn store_paths_under(&self, pootle_path: &str) -> Result<Vec<String>> {
        let tree = self.tree.read();
        if let Some(store) = tree.find_store(pootle_path) {
            return Ok(vec![tree.store_pootle_path(store)?]);
        }
        let dir = self.find_dir(&tree, pootle_path)?;
        let mut paths = tree
            .stores_under(dir)?
            .into_iter()
            .map(|id| tree.store_pootle_path(id))
            .collect::<Result<Vec<_>>>()?;
        paths.sort();
        Ok(paths)
    }

    fn find_dir(&self, tree: &DirectoryTree, pootle_path: &str) -> Result<DirId> {
        tree.find_dir(pootle_path)
            .ok_or_else(|| SyncError::NotFound(format!("directory {}", pootle_path)))
    }

    fn store_lock(&self, pootle_path: &str) -> Result<Arc<Mutex<Store>>> {
        let real_path = {
            let tree = self.tree.read();
            let id = tree
                .find_store(pootle_path)
                .ok_or_else(|| SyncError::NotFound(format!("store {}", pootle_path)))?;
            tree.store_real_path(id)?
        };
        let mut stores = self.stores.lock();
        let store = stores.entry(pootle_path.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Store::new(pootle_path, real_path, &self.services.config)))
        });
        Ok(store.clone())
    }

    /// Runs `f` on the store with its lock held.
    pub fn with_store<R, F>(&self, pootle_path: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Store, &Services<B>) -> Result<R>,
    {
        let store = self.store_lock(pootle_path)?;
        let result = {
            let mut guard = store.lock();
            f(&mut guard, &self.services)
        };
        if let Err(e) = &result {
            if e.is_missing() {
                warn!(store = pootle_path, "file vanished, rescanning project");
                self.rescan()?;
            }
        }
        result
    }

    pub fn quick_stats(&self, pootle_path: &str) -> Result<QuickStats> {
        Ok(QuickStats::from_counts(&self.stats_for(pootle_path, stats::QUICK_STATS)?))
    }

    pub fn complete_stats(&self, pootle_path: &str) -> Result<Counts> {
        self.stats_for(pootle_path, stats::COMPLETE_STATS)
    }

    /// Store statistics, or for a directory the sum over its children.
    fn stats_for(&self, pootle_path: &str, operation: &str) -> Result<Counts> {
        if !pootle_path.ends_with('/') {
            return self.with_store(pootle_path, |store, services| {
                if operation == stats::COMPLETE_STATS {
                    store.complete_stats(services)
                } else {
                    store.quick_stats(services).map(|s| s.to_counts())
                }
            });
        }
        let children = {
            let tree = self.tree.read();
            let dir = self.find_dir(&tree, pootle_path)?;
            let mut children = Vec::new();
            for store in tree.child_stores(dir)? {
                children.push(tree.store_pootle_path(store)?);
            }
            for child in tree.child_dirs(dir)? {
                children.push(tree.dir_pootle_path(child)?);
            }
            children
        };
        self.services.stats.get_or_compute(pootle_path, operation, || {
            let counts = children
                .iter()
                .map(|child| self.stats_for(child, operation))
                .collect::<Result<Vec<_>>>()?;
            Ok(Counts::sum(&counts))
        })
    }

    /// Updates one store from version control, folding local work back in.
    pub fn update_from_version_control(
        &self,
        pootle_path: &str,
        vcs: &dyn VersionControl,
    ) -> Result<VcsUpdateReport> {
        self.with_store(pootle_path, |store, services| {
            let old = store.quick_stats(services)?;
            store.sync(services)?;
            let working = store.snapshot(services)?;
            match vcs_update(store, services, vcs, &working, old) {
                Ok(report) => {
                    info!(store = pootle_path, ?report.merge, "updated from version control");
                    Ok(report)
                }
                Err(e) => {
                    error!(store = pootle_path, error = %e, "version control update failed, restoring working copy");
                    store.restore(services, &working)?;
                    Err(e)
                }
            }
        })
    }

    /// Syncs the store, then commits its file with a statistics summary as message.
    pub fn commit_file(&self, pootle_path: &str, vcs: &dyn VersionControl, author: Option<&str>) -> Result<String> {
        self.with_store(pootle_path, |store, services| {
            store.sync(services)?;
            let stats = store.quick_stats(services)?;
            let message = stats_message(store.name(), &stats);
            vcs.commit_file(store.real_path(), &message, author)?;
            info!(store = pootle_path, %message, "committed to version control");
            Ok(message)
        })
    }

    /// Updates every store. A failing store is reported and does not stop the others.
    pub fn update_project(&self, vcs: &dyn VersionControl) -> Result<ProjectUpdateReport> {
        let mut report = ProjectUpdateReport::default();
        for path in self.store_paths()? {
            match self.update_from_version_control(&path, vcs) {
                Ok(updated) => report.updated.push((path, updated)),
                Err(e) => report.failed.push((path, e.to_string())),
            }
        }
        self.rescan()?;
        Ok(report)
    }

    /// Searches every store under `pootle_path`, in path order.
    pub fn search(&self, pootle_path: &str, query: &str, fields: &[SearchField]) -> Result<Vec<SearchHit>> {
        let mut hits = Vec::new();
        for path in self.store_paths_under(pootle_path)? {
            hits.extend(self.with_store(&path, |store, services| store.search(services, query, fields))?);
        }
        Ok(hits)
    }

    /// Rebuilds the search index of every store. Returns how many stores were indexed.
    pub fn update_index(&self) -> Result<usize> {
        if self.services.index.is_none() {
            return Ok(0);
        }
        let paths = self.store_paths()?;
        for path in &paths {
            self.with_store(path, |store, services| store.reindex(services))?;
        }
        Ok(paths.len())
    }

    /// Writes pending rows to every file under `pootle_path`. Returns the stores saved.
    pub fn sync_all(&self, pootle_path: &str) -> Result<Vec<String>> {
        let mut saved = Vec::new();
        for path in self.store_paths_under(pootle_path)? {
            if self.with_store(&path, |store, services| store.sync(services))? {
                saved.push(path);
            }
        }
        Ok(saved)
    }

    /// Deletes a directory, its files and all state derived from them.
    pub fn delete_directory(&self, pootle_path: &str) -> Result<Vec<String>> {
        let (real, removed) = {
            let mut tree = self.tree.write();
            let dir = self.find_dir(&tree, pootle_path)?;
            let real = tree.dir_real_path(dir)?;
            (real, tree.remove_dir(dir)?)
        };
        for path in &removed {
            self.forget_store(path)?;
        }
        self.services.files.forget_under(&real);
        self.services.stats.invalidate(pootle_path, stats::ALL_OPERATIONS);
        self.services.stats.invalidate_prefix(pootle_path);
        if real.exists() {
            fs::remove_dir_all(&real).map_err(|e| SyncError::from_io(&real, e))?;
        }
        info!(dir = pootle_path, stores = removed.len(), "directory deleted");
        Ok(removed)
    }

    /// Renames a directory on disk and carries the rows of its stores over.
    pub fn rename_directory(&self, pootle_path: &str, new_name: &str) -> Result<String> {
        self.relocate(pootle_path, |tree, dir| tree.rename_dir(dir, new_name))
    }

    /// Moves a directory below `new_parent`, on disk and in the tree.
    pub fn move_directory(&self, pootle_path: &str, new_parent: &str) -> Result<String> {
        let parent = {
            let tree = self.tree.read();
            self.find_dir(&tree, new_parent)?
        };
        self.relocate(pootle_path, |tree, dir| tree.move_dir(dir, parent))
    }

    fn relocate<F>(&self, pootle_path: &str, change: F) -> Result<String>
    where
        F: FnOnce(&mut DirectoryTree, DirId) -> Result<()>,
    {
        let mut tree = self.tree.write();
        let dir = self.find_dir(&tree, pootle_path)?;
        let stores = tree.stores_under(dir)?;
        let old_real = tree.dir_real_path(dir)?;
        let old_paths = stores
            .iter()
            .map(|id| tree.store_pootle_path(*id))
            .collect::<Result<Vec<_>>>()?;

        change(&mut tree, dir)?;
        let new_real = tree.dir_real_path(dir)?;
        if let Err(e) = fs::rename(&old_real, &new_real) {
            // Undo the tree change by rescanning from disk, which still has the old layout.
            drop(tree);
            self.rescan()?;
            return Err(SyncError::from_io(&old_real, e));
        }

        let new_dir_path = tree.dir_pootle_path(dir)?;
        let backend = self.services.projection.backend();
        for (id, old_path) in stores.iter().zip(&old_paths) {
            let new_path = tree.store_pootle_path(*id)?;
            let rows = backend.load_rows(old_path)?;
            if !rows.is_empty() {
                backend.save_rows(&new_path, &rows)?;
            }
            let cached = self.stores.lock().remove(old_path);
            match cached {
                Some(store) => store.lock().forget(&self.services)?,
                None => backend.delete_rows(old_path)?,
            }
            self.services.stats.invalidate(&new_path, stats::ALL_OPERATIONS);
        }
        self.services.files.forget_under(&old_real);
        self.services.stats.invalidate_prefix(pootle_path);
        info!(from = pootle_path, to = %new_dir_path, "directory relocated");
        Ok(new_dir_path)
    }

    /// Repairs the database: stores without files are dropped, rows without units pruned.
    pub fn doctor(&self) -> Result<DoctorReport> {
        let mut report = DoctorReport::default();
        let scan = self.rescan()?;
        report.added_stores = scan.added_stores;
        report.dropped_stores = scan.removed_stores;

        let live = self.store_paths()?;
        for stored in self.services.projection.stores()? {
            if stored.starts_with(&self.pootle_path) && !live.contains(&stored) {
                self.services.projection.delete_store(&stored)?;
                report.dropped_stores.push(stored);
            }
        }
        for path in &live {
            report.pruned_rows += self.with_store(path, |store, services| store.prune_orphans(services))?;
        }
        report.dropped_stores.sort();
        report.dropped_stores.dedup();
        Ok(report)
    }
}

fn vcs_update<B: ProjectionBackend>(
    store: &mut Store,
    services: &Services<B>,
    vcs: &dyn VersionControl,
    working: &[u8],
    old: QuickStats,
) -> Result<VcsUpdateReport> {
    vcs.update_file(store.real_path())?;
    let remote = store.quick_stats(services)?;
    let name = store.real_path().to_path_buf();
    let merge = store.merge_bytes(services, &name, working, &MergeOptions::version_merge())?;
    let merged = store.quick_stats(services)?;
    Ok(VcsUpdateReport {
        old,
        remote,
        merged,
        merge,
    })
}

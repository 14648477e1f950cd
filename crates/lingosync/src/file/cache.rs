//! Bounded LRU cache of parsed file handles.
//!
//! Handles are shared as `Arc<RwLock<FileHandle>>`: the write lock is the
//! per-path mutual exclusion for saves. Eviction only drops the cache's
//! reference; a caller still holding the `Arc` keeps a working handle.
//!
//! Pinned entries are never evicted. Callers pin while editing and release the
//! [`PinGuard`] after the file has been saved.

use super::handle::FileHandle;
use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub type SharedHandle = Arc<RwLock<FileHandle>>;

struct CacheEntry {
    handle: SharedHandle,
    pins: usize,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<PathBuf, CacheEntry>,
    /// Front is least recently used.
    lru_queue: VecDeque<PathBuf>,
}

impl CacheInner {
    fn promote(&mut self, path: &Path) {
        if let Some(pos) = self.lru_queue.iter().position(|p| p == path) {
            if let Some(p) = self.lru_queue.remove(pos) {
                self.lru_queue.push_back(p);
            }
        }
    }

    fn remove(&mut self, path: &Path) -> Option<CacheEntry> {
        let entry = self.entries.remove(path)?;
        if let Some(pos) = self.lru_queue.iter().position(|p| p == path) {
            self.lru_queue.remove(pos);
        }
        Some(entry)
    }

    fn evict_over(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > capacity {
            let victim = self
                .lru_queue
                .iter()
                .find(|p| self.entries.get(*p).map_or(false, |e| e.pins == 0))
                .cloned();
            match victim {
                Some(path) => {
                    debug!(path = %path.display(), "evicting parsed file");
                    self.remove(&path);
                    evicted += 1;
                }
                None => {
                    warn!(
                        entries = self.entries.len(),
                        capacity, "file cache over capacity, every entry is pinned"
                    );
                    break;
                }
            }
        }
        evicted
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct FileCache {
    capacity: usize,
    inner: Arc<Mutex<CacheInner>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl FileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(CacheInner::default())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().entries.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<SharedHandle> {
        let mut inner = self.inner.lock();
        let handle = inner.entries.get(path).map(|e| e.handle.clone());
        if handle.is_some() {
            inner.promote(path);
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        handle
    }

    /// Returns the cached handle for `path`, opening it with `open` on a miss.
    ///
    /// `open` runs without the cache lock held. When two callers race on the
    /// same path the first insert wins and the other parse is discarded.
    pub fn get_or_open<F>(&self, path: &Path, open: F) -> Result<SharedHandle>
    where
        F: FnOnce() -> Result<FileHandle>,
    {
        if let Some(handle) = self.get(path) {
            return Ok(handle);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(path = %path.display(), "file cache miss");
        let handle = open()?;
        Ok(self.insert(path, handle))
    }

    /// Inserts a freshly opened handle, keeping an existing entry if one appeared meanwhile.
    pub fn insert(&self, path: &Path, handle: FileHandle) -> SharedHandle {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.entries.get(path).map(|e| e.handle.clone()) {
            inner.promote(path);
            return existing;
        }
        let shared = Arc::new(RwLock::new(handle));
        inner.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                handle: shared.clone(),
                pins: 0,
            },
        );
        inner.lru_queue.push_back(path.to_path_buf());
        let evicted = inner.evict_over(self.capacity);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        shared
    }

    /// Drops `path` from the cache. Pinned entries stay; returns whether it was removed.
    pub fn evict(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(path) {
            Some(entry) if entry.pins > 0 => false,
            Some(_) => {
                inner.remove(path);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Drops every entry under `dir`, pinned or not. Used when a directory is deleted.
    pub fn forget_under(&self, dir: &Path) {
        let mut inner = self.inner.lock();
        let doomed: Vec<PathBuf> = inner
            .entries
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect();
        for path in doomed {
            inner.remove(&path);
        }
    }

    /// Pins `path` until the returned guard is dropped. `None` when not cached.
    pub fn pin(&self, path: &Path) -> Option<PinGuard> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(path)?;
        entry.pins += 1;
        Some(PinGuard {
            inner: self.inner.clone(),
            path: path.to_path_buf(),
            capacity: self.capacity,
        })
    }

    pub fn is_pinned(&self, path: &Path) -> bool {
        self.inner
            .lock()
            .entries
            .get(path)
            .map_or(false, |e| e.pins > 0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Keeps a cache entry pinned. Unpins on drop and trims the cache back to capacity.
pub struct PinGuard {
    inner: Arc<Mutex<CacheInner>>,
    path: PathBuf,
    capacity: usize,
}

impl PinGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the pin. Dropping the guard does the same.
    pub fn unpin(self) {}
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&self.path) {
            entry.pins = entry.pins.saturating_sub(1);
        }
        inner.evict_over(self.capacity);
    }
}

//! # Store
//!
//! One translation file and everything derived from it. A [`Store`] ties the
//! file handle (through the shared [`FileCache`]), the projection rows, the
//! suggestion side file, the translation memory and the search index
//! together. It holds no parsed data itself; the session-scoped caches live
//! in [`Services`], owned by the project.
//!
//! ## Consistency
//!
//! Every entry point starts with [`Store::require_units`]: the file is
//! re-parsed when its fingerprint moved, and the rows are re-pulled when the
//! parse is newer than the last pull. So for a store at or beyond
//! [`ParseState::Parsed`] the rows always describe the units of the latest
//! parse.
//!
//! Mutations follow one order: rows are committed in a single transaction,
//! then pushed onto the units, the file is saved and re-pulled, statistics
//! are invalidated and the search index is refreshed. The index refresh is
//! best effort.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::file::{FileCache, FileHandle, SharedHandle};
use crate::format::{self, format_for_path};
use crate::merge::{merge_units, MergeOptions, MergeReport};
use crate::model::{MultiString, ParseState, Unit};
use crate::projection::{ProjectionBackend, RecordProjection, RowId, UnitRow, UnitUpdate};
use crate::search::{linear_search, SearchField, SearchHit, SearchIndex};
use crate::stats::{self, Counts, QualityChecker, QuickStats, StandardChecker, StatsCache};
use crate::suggestions::{self, pick_for_removal, Suggestion, SuggestionStore};
use crate::tm::TranslationMemory;
use crate::units::UnitStore;
use chrono::Utc;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Session-scoped state shared by every store of a project.
pub struct Services<B: ProjectionBackend> {
    pub config: SyncConfig,
    pub projection: RecordProjection<B>,
    pub files: FileCache,
    pub stats: StatsCache,
    pub index: Option<SearchIndex>,
    pub checker: Box<dyn QualityChecker>,
}

impl<B: ProjectionBackend> Services<B> {
    /// Services for a project rooted at `project_root`. The index lives under
    /// `<project_root>/<index_dir>` unless indexing is disabled.
    pub fn new(config: SyncConfig, backend: B, project_root: &Path) -> Self {
        let index = config
            .indexing_enabled
            .then(|| SearchIndex::open(project_root.join(&config.index_dir)));
        Self {
            files: FileCache::new(config.file_cache_size),
            stats: StatsCache::new(config.stats_ttl(), config.cache.clone()),
            projection: RecordProjection::with_backend(backend),
            index,
            checker: Box::new(StandardChecker),
            config,
        }
    }

    pub fn with_checker(mut self, checker: Box<dyn QualityChecker>) -> Self {
        self.checker = checker;
        self
    }
}

/// `path` with `suffix` appended to its file name.
pub fn side_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

pub struct Store {
    pootle_path: String,
    real_path: PathBuf,
    state: ParseState,
    synced_generation: Option<u64>,
    suggestions: SuggestionStore,
    tm: TranslationMemory,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("pootle_path", &self.pootle_path)
            .field("real_path", &self.real_path)
            .field("state", &self.state)
            .finish()
    }
}

impl Store {
    pub fn new(pootle_path: impl Into<String>, real_path: impl Into<PathBuf>, config: &SyncConfig) -> Self {
        let real_path = real_path.into();
        let embedded = format_for_path(&real_path, &config.side_suffixes())
            .map_or(false, |f| f.supports_alternates());
        let suggestions = if embedded {
            SuggestionStore::embedded()
        } else {
            SuggestionStore::side_file(side_path(&real_path, &config.pending_suffix))
        };
        Self {
            pootle_path: pootle_path.into(),
            tm: TranslationMemory::new(side_path(&real_path, &config.tm_suffix)),
            real_path,
            state: ParseState::Unparsed,
            synced_generation: None,
            suggestions,
        }
    }

    pub fn pootle_path(&self) -> &str {
        &self.pootle_path
    }

    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// File name, as used in commit messages.
    pub fn name(&self) -> &str {
        self.pootle_path.rsplit('/').next().unwrap_or(&self.pootle_path)
    }

    pub fn handle<B: ProjectionBackend>(&self, services: &Services<B>) -> Result<SharedHandle> {
        let suffixes = services.config.side_suffixes();
        services
            .files
            .get_or_open(&self.real_path, || FileHandle::open(&self.real_path, &suffixes))
    }

    /// Parses the file if needed and brings the rows up to date with it.
    pub fn require_units<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<SharedHandle> {
        let shared = self.handle(services)?;
        {
            let mut handle = shared.write();
            let reparsed = handle.reload_if_stale()?;
            if reparsed || self.synced_generation != Some(handle.generation()) {
                let report = services.projection.pull_from_file(&self.pootle_path, handle.units())?;
                self.synced_generation = Some(handle.generation());
                self.state = ParseState::Parsed;
                if report.changed() || reparsed {
                    services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
                    self.refresh_index(services, &handle, None);
                }
            }
        }
        Ok(shared)
    }

    /// Rows of the units currently in the file, in file order. Orphans are left out.
    pub fn rows<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<Vec<UnitRow>> {
        let shared = self.require_units(services)?;
        let handle = shared.read();
        self.live_rows(services, handle.units())
    }

    fn live_rows<B: ProjectionBackend>(&self, services: &Services<B>, units: &UnitStore) -> Result<Vec<UnitRow>> {
        let mut rows = services.projection.rows(&self.pootle_path)?;
        rows.retain(|r| units.position_of(&r.unitid).is_some());
        Ok(rows)
    }

    pub fn get_unit<B: ProjectionBackend>(&mut self, services: &Services<B>, id: RowId) -> Result<UnitRow> {
        self.rows(services)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("unit {} in {}", id, self.pootle_path)))
    }

    /// The row at file position `itemno`.
    pub fn get_item<B: ProjectionBackend>(&mut self, services: &Services<B>, itemno: usize) -> Result<UnitRow> {
        self.rows(services)?
            .into_iter()
            .find(|r| r.index == itemno && !r.obsolete)
            .ok_or_else(|| SyncError::NotFound(format!("item {} in {}", itemno, self.pootle_path)))
    }

    pub fn quick_stats<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<QuickStats> {
        let shared = self.require_units(services)?;
        let counts = services.stats.get_or_compute(&self.pootle_path, stats::QUICK_STATS, || {
            let rows = self.live_rows(services, shared.read().units())?;
            Ok(QuickStats::from_rows(&rows).to_counts())
        })?;
        Ok(QuickStats::from_counts(&counts))
    }

    pub fn complete_stats<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<Counts> {
        let shared = self.require_units(services)?;
        let counts = services.stats.get_or_compute(&self.pootle_path, stats::COMPLETE_STATS, || {
            let rows = self.live_rows(services, shared.read().units())?;
            Ok(stats::complete_stats(&rows, services.checker.as_ref()))
        })?;
        self.state = ParseState::Checked;
        Ok(counts)
    }

    /// Applies a translator's edit to one unit and saves the file.
    ///
    /// Returns false when the edit changes nothing; the file is not touched then.
    pub fn update_unit<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        id: RowId,
        update: &UnitUpdate,
        user: Option<&str>,
    ) -> Result<bool> {
        let shared = self.require_units(services)?;
        let _pin = services.files.pin(&self.real_path);
        let mut handle = shared.write();

        let mut txn = services.projection.begin(&self.pootle_path)?;
        let live = txn
            .get_by_id(id)
            .map_or(false, |row| handle.units().position_of(&row.unitid).is_some());
        if !live {
            return Err(SyncError::NotFound(format!("unit {} in {}", id, self.pootle_path)));
        }
        let changed = txn.modify_by_id(id, |row| row.apply_update(update)).unwrap_or(false);
        if !changed {
            return Ok(false);
        }
        let row = txn
            .get_by_id(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("unit {} in {}", id, self.pootle_path)))?;
        txn.commit()?;

        let unit = handle
            .units_mut()
            .by_id_mut(&row.unitid)
            .ok_or_else(|| SyncError::Store(format!("{} has no unit {}", self.pootle_path, row.unitid)))?;
        row.sync_onto(unit);
        if handle.format().supports_header() {
            let mut header = handle.units().header().unwrap_or_default();
            header.set("PO-Revision-Date", Utc::now().format("%Y-%m-%d %H:%M%z").to_string());
            if let Some(user) = user {
                header.set("Last-Translator", user);
            }
            header.set("X-Generator", suggestions::generator());
            handle.units_mut().set_header(&header);
        }
        self.persist(services, &mut handle, Some(id))?;
        debug!(store = %self.pootle_path, unit = %id, "unit updated");
        Ok(true)
    }

    /// Saves the file and re-pulls it, then drops derived state.
    fn persist<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        handle: &mut FileHandle,
        unit: Option<RowId>,
    ) -> Result<()> {
        if let Err(err) = handle.save_or_reload() {
            // The committed rows still differ from the reloaded file; the next sync writes them.
            self.synced_generation = Some(handle.generation());
            return Err(err);
        }
        services.projection.pull_from_file(&self.pootle_path, handle.units())?;
        self.synced_generation = Some(handle.generation());
        self.state = ParseState::Parsed;
        services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
        self.refresh_index(services, handle, unit);
        Ok(())
    }

    /// Writes rows that differ from the file back to it. Returns whether the file was saved.
    pub fn sync<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<bool> {
        let shared = self.handle(services)?;
        let _pin = services.files.pin(&self.real_path);
        let mut handle = shared.write();
        if handle.reload_if_stale()? {
            // Edits on disk win over rows written since the last pull.
            services.projection.pull_from_file(&self.pootle_path, handle.units())?;
            self.synced_generation = Some(handle.generation());
            services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
        }
        let pushed = services
            .projection
            .push_to_file(&self.pootle_path, handle.units_mut())?;
        self.suggestions.save()?;
        if pushed == 0 {
            if self.synced_generation != Some(handle.generation()) {
                services.projection.pull_from_file(&self.pootle_path, handle.units())?;
                self.synced_generation = Some(handle.generation());
            }
            self.state = self.state.max(ParseState::Parsed);
            return Ok(false);
        }
        self.persist(services, &mut handle, None)?;
        info!(store = %self.pootle_path, units = pushed, "synced rows to file");
        Ok(true)
    }

    fn with_unit<B, R, F>(&mut self, services: &Services<B>, id: RowId, f: F) -> Result<R>
    where
        B: ProjectionBackend,
        F: FnOnce(&mut SuggestionStore, &mut FileHandle, String) -> Result<R>,
    {
        let shared = self.require_units(services)?;
        let unitid = services
            .projection
            .rows(&self.pootle_path)?
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| r.unitid)
            .ok_or_else(|| SyncError::NotFound(format!("unit {} in {}", id, self.pootle_path)))?;
        let mut handle = shared.write();
        if handle.units().position_of(&unitid).is_none() {
            return Err(SyncError::NotFound(format!("unit {} in {}", id, self.pootle_path)));
        }
        f(&mut self.suggestions, &mut *handle, unitid)
    }

    pub fn suggestions<B: ProjectionBackend>(&mut self, services: &Services<B>, id: RowId) -> Result<Vec<Suggestion>> {
        self.with_unit(services, id, |store, handle, unitid| {
            let unit = lookup(handle, &unitid)?.clone();
            store.list_for(&unit)
        })
    }

    /// Records a suggestion. Duplicates and blank targets are silently ignored.
    pub fn add_suggestion<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        id: RowId,
        target: MultiString,
        author: Option<&str>,
    ) -> Result<bool> {
        let embedded = self.suggestions.is_embedded();
        self.with_unit(services, id, |store, handle, unitid| {
            let template = handle.units().header();
            let unit = lookup_mut(handle, &unitid)?;
            let added = store.add(unit, target, author, template.as_ref())?;
            if added && embedded {
                handle.save()?;
            }
            store.save()?;
            Ok(added)
        })
    }

    /// Removes a suggestion. Returns false when nothing matched.
    pub fn delete_suggestion<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        id: RowId,
        position: usize,
        expected: &MultiString,
    ) -> Result<bool> {
        let embedded = self.suggestions.is_embedded();
        self.with_unit(services, id, |store, handle, unitid| {
            let unit = lookup_mut(handle, &unitid)?;
            let removed = store.remove(unit, position, expected)?;
            if removed && embedded {
                handle.save()?;
            }
            store.save()?;
            Ok(removed)
        })
    }

    /// Makes a suggestion the unit's translation and drops it from the pending list.
    pub fn accept_suggestion<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        id: RowId,
        position: usize,
        expected: &MultiString,
        user: Option<&str>,
    ) -> Result<bool> {
        let pending = self.suggestions(services, id)?;
        let Some(chosen) = pick_for_removal(&pending, position, expected) else {
            return Err(SyncError::NotFound(format!("suggestion {} for unit {}", position, id)));
        };
        let target = pending[chosen].target.clone();
        self.delete_suggestion(services, id, chosen, &target)?;
        let update = UnitUpdate::target(target).with_fuzzy(false);
        self.update_unit(services, id, &update, user)
    }

    pub fn suggester<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        id: RowId,
        position: usize,
    ) -> Result<Option<String>> {
        Ok(self
            .suggestions(services, id)?
            .into_iter()
            .nth(position)
            .and_then(|s| s.author))
    }

    /// Translation-memory entries recorded for the unit's source locations.
    pub fn tm_suggestions<B: ProjectionBackend>(&mut self, services: &Services<B>, id: RowId) -> Result<Vec<Unit>> {
        let row = self.get_unit(services, id)?;
        let shared = self.handle(services)?;
        let handle = shared.read();
        let unit = lookup(&handle, &row.unitid)?;
        self.tm.suggestions_for(unit)
    }

    pub fn pending_suggestions<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<usize> {
        if self.suggestions.is_embedded() {
            let shared = self.require_units(services)?;
            let handle = shared.read();
            return Ok(handle.units().units().iter().map(|u| u.alternates.len()).sum());
        }
        self.suggestions.pending_count()
    }

    /// Merges the translation file at `path` into this store.
    pub fn merge_file<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        path: &Path,
        options: &MergeOptions,
    ) -> Result<MergeReport> {
        let bytes = fs::read(path).map_err(|e| SyncError::from_io(path, e))?;
        self.merge_bytes(services, path, &bytes, options)
    }

    /// Merges `bytes`, parsed with the format `name` implies. Nothing is touched
    /// when the bytes do not parse.
    pub fn merge_bytes<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        name: &Path,
        bytes: &[u8],
        options: &MergeOptions,
    ) -> Result<MergeReport> {
        let format = format::detect(name, bytes, &services.config.side_suffixes())
            .ok_or_else(|| SyncError::UnsupportedFormat(name.to_path_buf()))?;
        let parsed = format.parse(bytes).map_err(|source| SyncError::Parse {
            path: name.to_path_buf(),
            source,
        })?;
        let incoming = UnitStore::from(parsed);

        let shared = self.require_units(services)?;
        let _pin = services.files.pin(&self.real_path);
        let mut handle = shared.write();
        let merged = merge_units(
            &services.projection,
            &self.pootle_path,
            &mut *handle,
            &mut self.suggestions,
            &incoming,
            options,
        );
        self.synced_generation = Some(handle.generation());
        let report = merged?;
        if report.changed() {
            services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
            self.refresh_index(services, &handle, None);
        }
        Ok(report)
    }

    /// The bytes of the file as they are on disk.
    pub fn snapshot<B: ProjectionBackend>(&self, services: &Services<B>) -> Result<Vec<u8>> {
        let shared = self.handle(services)?;
        let handle = shared.read();
        handle.snapshot()
    }

    /// Puts `bytes` back on disk and re-pulls them.
    pub fn restore<B: ProjectionBackend>(&mut self, services: &Services<B>, bytes: &[u8]) -> Result<()> {
        let shared = self.handle(services)?;
        let mut handle = shared.write();
        handle.restore(bytes)?;
        services.projection.pull_from_file(&self.pootle_path, handle.units())?;
        self.synced_generation = Some(handle.generation());
        self.state = ParseState::Parsed;
        services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
        self.refresh_index(services, &handle, None);
        Ok(())
    }

    /// Hits for `query` in this store: the index when usable, a row scan otherwise.
    pub fn search<B: ProjectionBackend>(
        &mut self,
        services: &Services<B>,
        query: &str,
        fields: &[SearchField],
    ) -> Result<Vec<SearchHit>> {
        let shared = self.require_units(services)?;
        if let Some(index) = &services.index {
            self.refresh_index(services, &shared.read(), None);
            if let Some(hits) = index.search(&self.pootle_path, query, fields) {
                return Ok(hits);
            }
        }
        let rows = self.live_rows(services, shared.read().units())?;
        Ok(linear_search(&self.pootle_path, &rows, query, fields))
    }

    /// Forces a full rebuild of this store's index documents.
    pub fn reindex<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<()> {
        let Some(index) = &services.index else {
            return Ok(());
        };
        let shared = self.require_units(services)?;
        index.enable(&self.pootle_path);
        index.remove_store(&self.pootle_path)?;
        self.refresh_index(services, &shared.read(), None);
        Ok(())
    }

    /// Rows whose unit is gone from the file.
    pub fn orphans<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<Vec<UnitRow>> {
        let shared = self.require_units(services)?;
        let handle = shared.read();
        services.projection.orphans(&self.pootle_path, handle.units())
    }

    pub fn prune_orphans<B: ProjectionBackend>(&mut self, services: &Services<B>) -> Result<usize> {
        let shared = self.require_units(services)?;
        let handle = shared.read();
        let removed = services.projection.prune_orphans(&self.pootle_path, handle.units())?;
        if removed > 0 {
            services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
            self.refresh_index(services, &handle, None);
        }
        Ok(removed)
    }

    /// Drops everything derived from this store: rows, cached handle, stats and index documents.
    pub fn forget<B: ProjectionBackend>(&self, services: &Services<B>) -> Result<()> {
        services.projection.delete_store(&self.pootle_path)?;
        services.files.evict(&self.real_path);
        services.stats.invalidate(&self.pootle_path, stats::ALL_OPERATIONS);
        if let Some(index) = &services.index {
            if let Err(e) = index.remove_store(&self.pootle_path) {
                warn!(store = %self.pootle_path, error = %e, "could not drop index documents");
            }
        }
        Ok(())
    }

    fn refresh_index<B: ProjectionBackend>(&self, services: &Services<B>, handle: &FileHandle, unit: Option<RowId>) {
        let Some(index) = &services.index else {
            return;
        };
        match self.live_rows(services, handle.units()) {
            Ok(rows) => {
                index.refresh(&self.pootle_path, &handle.fingerprint().mtime_token(), &rows, unit);
            }
            Err(e) => {
                warn!(store = %self.pootle_path, error = %e, "rows unavailable for indexing");
                index.disable(&self.pootle_path);
            }
        }
    }
}

fn lookup<'a>(handle: &'a FileHandle, unitid: &str) -> Result<&'a Unit> {
    handle
        .units()
        .by_id(unitid)
        .ok_or_else(|| SyncError::NotFound(format!("unit {}", unitid)))
}

fn lookup_mut<'a>(handle: &'a mut FileHandle, unitid: &str) -> Result<&'a mut Unit> {
    handle
        .units_mut()
        .by_id_mut(unitid)
        .ok_or_else(|| SyncError::NotFound(format!("unit {}", unitid)))
}

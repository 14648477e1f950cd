//! # Record Projection
//!
//! A durable row per translatable unit, kept so statistics and searches never
//! have to parse files. The file stays the source of truth: the projection is a
//! lazily reconciled cache of it.
//!
//! ## Reconciliation
//!
//! - **Pull** ([`RecordProjection::pull_from_file`]): every translatable unit
//!   is upserted by its stable id, never by position. Rows whose unit is gone
//!   from the file are left alone; if their position collides with a live
//!   unit they are moved past the end so `(store, index)` stays unique.
//!   A pull that changes nothing saves nothing.
//! - **Push** ([`RecordProjection::push_to_file`]): the translator-owned
//!   fields of each row are written onto the matching in-memory unit. The
//!   caller saves the file afterwards.
//!
//! ## Transactions
//!
//! All row edits of one logical operation go through a [`Transaction`]. It
//! works on a private copy of the rows and writes them back with a single
//! backend save on [`Transaction::commit`]. Dropping it discards the edits.
//!
//! ## Backends
//!
//! - [`fs_backend::FsBackend`]: JSON documents on disk, atomic writes.
//! - [`mem_backend::MemBackend`]: in memory, for tests.

use crate::error::Result;
use crate::units::UnitStore;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub mod backend;
pub mod fs_backend;
pub mod mem_backend;
pub mod row;

pub use backend::ProjectionBackend;
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
pub use row::{RowId, UnitRow, UnitUpdate};

/// What a pull did to the rows of one store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PullReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub relocated: usize,
    pub duplicates: usize,
}

impl PullReport {
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.relocated > 0
    }
}

pub struct RecordProjection<B: ProjectionBackend> {
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
}

impl<B: ProjectionBackend> RecordProjection<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Rows of `store` ordered by file position.
    pub fn rows(&self, store: &str) -> Result<Vec<UnitRow>> {
        let mut rows = self.backend.load_rows(store)?;
        rows.sort_by_key(|r| r.index);
        Ok(rows)
    }

    pub fn begin(&self, store: &str) -> Result<Transaction<'_, B>> {
        let rows = self.backend.load_rows(store)?;
        Ok(Transaction::new(self, store, rows))
    }

    /// Upserts every translatable unit of the file into the rows of `store`.
    pub fn pull_from_file(&self, store: &str, units: &UnitStore) -> Result<PullReport> {
        let mut txn = self.begin(store)?;
        let report = txn.pull(units);
        txn.commit()?;
        if report.changed() {
            debug!(store, ?report, "pulled file into projection");
        }
        Ok(report)
    }

    /// Writes row values onto the matching units. Returns how many units changed.
    pub fn push_to_file(&self, store: &str, units: &mut UnitStore) -> Result<usize> {
        let rows = self.backend.load_rows(store)?;
        Ok(push_rows(&rows, units))
    }

    /// Deletes rows whose unit no longer exists in the file.
    pub fn prune_orphans(&self, store: &str, units: &UnitStore) -> Result<usize> {
        let mut txn = self.begin(store)?;
        let removed = txn.retain(|row| units.position_of(&row.unitid).is_some());
        txn.commit()?;
        Ok(removed)
    }

    /// Rows whose unit no longer exists in the file.
    pub fn orphans(&self, store: &str, units: &UnitStore) -> Result<Vec<UnitRow>> {
        Ok(self
            .rows(store)?
            .into_iter()
            .filter(|row| units.position_of(&row.unitid).is_none())
            .collect())
    }

    pub fn delete_store(&self, store: &str) -> Result<()> {
        self.backend.delete_rows(store)
    }

    pub fn stores(&self) -> Result<Vec<String>> {
        self.backend.list_stores()
    }
}

pub(crate) fn push_rows(rows: &[UnitRow], units: &mut UnitStore) -> usize {
    let mut changed = 0;
    for row in rows {
        let Some(pos) = units.position_of(&row.unitid) else {
            continue;
        };
        if let Some(unit) = units.get_mut(pos) {
            if row.sync_onto(unit) {
                changed += 1;
            }
        }
    }
    changed
}

/// Buffered row edits for one store.
pub struct Transaction<'a, B: ProjectionBackend> {
    projection: &'a RecordProjection<B>,
    store: String,
    rows: Vec<UnitRow>,
    by_unitid: HashMap<String, usize>,
    next_id: u64,
    dirty: bool,
}

impl<'a, B: ProjectionBackend> Transaction<'a, B> {
    fn new(projection: &'a RecordProjection<B>, store: &str, rows: Vec<UnitRow>) -> Self {
        let next_id = rows.iter().map(|r| r.id.0 + 1).max().unwrap_or(1);
        let mut txn = Self {
            projection,
            store: store.to_string(),
            rows,
            by_unitid: HashMap::new(),
            next_id,
            dirty: false,
        };
        txn.reindex();
        txn
    }

    fn reindex(&mut self) {
        self.by_unitid.clear();
        for (i, row) in self.rows.iter().enumerate() {
            self.by_unitid.entry(row.unitid.clone()).or_insert(i);
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn rows(&self) -> &[UnitRow] {
        &self.rows
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, unitid: &str) -> Option<&UnitRow> {
        self.by_unitid.get(unitid).map(|&i| &self.rows[i])
    }

    pub fn get_by_id(&self, id: RowId) -> Option<&UnitRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Applies `f` to the row for `unitid`; the transaction is dirtied when `f` returns true.
    pub fn modify<F>(&mut self, unitid: &str, f: F) -> Option<bool>
    where
        F: FnOnce(&mut UnitRow) -> bool,
    {
        let i = *self.by_unitid.get(unitid)?;
        let changed = f(&mut self.rows[i]);
        self.dirty |= changed;
        Some(changed)
    }

    pub fn modify_by_id<F>(&mut self, id: RowId, f: F) -> Option<bool>
    where
        F: FnOnce(&mut UnitRow) -> bool,
    {
        let row = self.rows.iter_mut().find(|r| r.id == id)?;
        let changed = f(row);
        self.dirty |= changed;
        Some(changed)
    }

    pub fn allocate_id(&mut self) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, row: UnitRow) {
        self.next_id = self.next_id.max(row.id.0 + 1);
        self.by_unitid
            .entry(row.unitid.clone())
            .or_insert(self.rows.len());
        self.rows.push(row);
        self.dirty = true;
    }

    /// Keeps rows matching `keep`. Returns how many were removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&UnitRow) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|r| keep(r));
        let removed = before - self.rows.len();
        if removed > 0 {
            self.dirty = true;
            self.reindex();
        }
        removed
    }

    /// Reconciles the buffered rows with the units of the file.
    pub fn pull(&mut self, units: &UnitStore) -> PullReport {
        let mut report = PullReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut live_positions: HashSet<usize> = HashSet::new();

        for (pos, unit) in units.translatable() {
            let unitid = unit.id();
            if !seen.insert(unitid.clone()) {
                warn!(store = %self.store, unitid = %unitid, position = pos, "duplicate unit id in file, keeping the first");
                report.duplicates += 1;
                continue;
            }
            live_positions.insert(pos);
            match self.modify(&unitid, |row| row.update_from_unit(pos, unit)) {
                Some(true) => report.updated += 1,
                Some(false) => report.unchanged += 1,
                None => {
                    let id = self.allocate_id();
                    self.insert(UnitRow::from_unit(id, pos, unit));
                    report.added += 1;
                }
            }
        }

        let highest = self.rows.iter().map(|r| r.index + 1).max().unwrap_or(0);
        let mut next_free = units.len().max(highest);
        for row in self.rows.iter_mut() {
            if seen.contains(&row.unitid) || !live_positions.contains(&row.index) {
                continue;
            }
            while live_positions.contains(&next_free) {
                next_free += 1;
            }
            debug!(store = %self.store, unitid = %row.unitid, from = row.index, to = next_free, "relocating orphan row");
            row.index = next_free;
            next_free += 1;
            report.relocated += 1;
            self.dirty = true;
        }
        report
    }

    /// Writes the buffered row values onto `units`.
    pub fn push(&self, units: &mut UnitStore) -> usize {
        push_rows(&self.rows, units)
    }

    /// Saves the rows with one backend write. Returns whether anything was written.
    pub fn commit(self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let mut rows = self.rows;
        rows.sort_by_key(|r| r.index);
        self.projection.backend.save_rows(&self.store, &rows)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MultiString, Unit};

    const STORE: &str = "/sw/demo/app.po";

    fn units() -> UnitStore {
        UnitStore::new(vec![
            Unit::new("").with_target("Language: sw\n"),
            Unit::new("One fish"),
            Unit::new("Two fish").with_target("Samaki wawili"),
        ])
    }

    fn projection() -> RecordProjection<MemBackend> {
        RecordProjection::with_backend(MemBackend::new())
    }

    #[test]
    fn test_pull_creates_rows_for_translatable_units() {
        let proj = projection();
        let report = proj.pull_from_file(STORE, &units()).unwrap();
        assert_eq!(report.added, 2);

        let rows = proj.rows(STORE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[1].target().first(), "Samaki wawili");
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[test]
    fn test_second_pull_writes_nothing() {
        let proj = projection();
        let units = units();
        proj.pull_from_file(STORE, &units).unwrap();
        assert_eq!(proj.backend.save_count(), 1);

        let report = proj.pull_from_file(STORE, &units).unwrap();
        assert!(!report.changed());
        assert_eq!(report.unchanged, 2);
        assert_eq!(proj.backend.save_count(), 1);
    }

    #[test]
    fn test_pull_matches_by_id_not_position() {
        let proj = projection();
        proj.pull_from_file(STORE, &units()).unwrap();
        let ids_before: Vec<RowId> = proj.rows(STORE).unwrap().iter().map(|r| r.id).collect();

        let reordered = UnitStore::new(vec![
            Unit::new("Two fish").with_target("Samaki wawili"),
            Unit::new("One fish"),
        ]);
        let report = proj.pull_from_file(STORE, &reordered).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.added, 0);

        let rows = proj.rows(STORE).unwrap();
        assert_eq!(rows[0].unitid, "Two fish");
        assert_eq!(rows[0].id, ids_before[1]);
    }

    #[test]
    fn test_orphan_rows_are_kept_and_moved_out_of_the_way() {
        let proj = projection();
        proj.pull_from_file(STORE, &units()).unwrap();

        let replaced = UnitStore::new(vec![
            Unit::new("").with_target("Language: sw\n"),
            Unit::new("Red fish"),
        ]);
        let report = proj.pull_from_file(STORE, &replaced).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.relocated, 1);

        let rows = proj.rows(STORE).unwrap();
        assert_eq!(rows.len(), 3);
        let mut positions: Vec<usize> = rows.iter().map(|r| r.index).collect();
        positions.dedup();
        assert_eq!(positions.len(), 3);
        assert_eq!(proj.orphans(STORE, &replaced).unwrap().len(), 2);

        assert_eq!(proj.prune_orphans(STORE, &replaced).unwrap(), 2);
        assert_eq!(proj.rows(STORE).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let proj = projection();
        let dupes = UnitStore::new(vec![
            Unit::new("Fish").with_target("Samaki"),
            Unit::new("Fish").with_target("Nyama"),
        ]);
        let report = proj.pull_from_file(STORE, &dupes).unwrap();
        assert_eq!(report.duplicates, 1);
        let rows = proj.rows(STORE).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target().first(), "Samaki");
    }

    #[test]
    fn test_push_writes_rows_onto_units() {
        let proj = projection();
        let mut units = units();
        proj.pull_from_file(STORE, &units).unwrap();

        let mut txn = proj.begin(STORE).unwrap();
        txn.modify("One fish", |row| {
            row.apply_update(&UnitUpdate::target("Samaki mmoja"))
        });
        assert!(txn.commit().unwrap());

        assert_eq!(proj.push_to_file(STORE, &mut units).unwrap(), 1);
        assert_eq!(units.get(1).unwrap().target.first(), "Samaki mmoja");
        assert_eq!(proj.push_to_file(STORE, &mut units).unwrap(), 0);
    }

    #[test]
    fn test_dropped_transaction_has_no_effect() {
        let proj = projection();
        proj.pull_from_file(STORE, &units()).unwrap();
        {
            let mut txn = proj.begin(STORE).unwrap();
            txn.modify("One fish", |row| {
                row.set_target(MultiString::new("lost"));
                true
            });
        }
        let rows = proj.rows(STORE).unwrap();
        assert!(rows[0].target().is_empty());
        assert_eq!(proj.backend.save_count(), 1);
    }

    #[test]
    fn test_failed_commit_surfaces_error() {
        let proj = projection();
        proj.backend.set_simulate_write_error(true);
        assert!(proj.pull_from_file(STORE, &units()).is_err());
        assert!(proj.rows(STORE).unwrap().is_empty());
    }
}

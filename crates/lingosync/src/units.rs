//! # Unit Store
//!
//! The ordered units of one parsed file plus lazily built lookup indices.
//!
//! ## Structural Generation
//!
//! Every change that shifts positions or replaces the unit list (a push, a
//! header insertion, a reparse) bumps a monotonic `generation`. The indices
//! remember the generation they were built at; a lookup against a different
//! generation throws them away and rebuilds in one O(n) pass. There is no
//! incremental maintenance.
//!
//! In-place edits of a unit's target or flags through [`UnitStore::get_mut`]
//! do not bump the generation: ids and source hashes are unaffected. Editing
//! a unit's source or context through `get_mut` requires calling
//! [`UnitStore::touch`].

use crate::model::{Header, MultiString, ParsedFile, Unit};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Generations are unique across all stores, so a handle reloaded into a
/// fresh `UnitStore` never reuses the number of its predecessor.
fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Default)]
struct Indices {
    by_id: HashMap<String, usize>,
    by_source_hash: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Default)]
enum IndexState {
    #[default]
    Unbuilt,
    Built { generation: u64, indices: Indices },
}

#[derive(Debug)]
pub struct UnitStore {
    units: Vec<Unit>,
    generation: u64,
    index: Mutex<IndexState>,
}

impl Default for UnitStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Clone for UnitStore {
    fn clone(&self) -> Self {
        Self::new(self.units.clone())
    }
}

impl From<ParsedFile> for UnitStore {
    fn from(parsed: ParsedFile) -> Self {
        Self::new(parsed.units)
    }
}

impl UnitStore {
    pub fn new(units: Vec<Unit>) -> Self {
        Self {
            units,
            generation: next_generation(),
            index: Mutex::new(IndexState::Unbuilt),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Unit> {
        self.units.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Unit> {
        self.units.get_mut(position)
    }

    /// Units that get projection rows, with their file positions.
    pub fn translatable(&self) -> impl Iterator<Item = (usize, &Unit)> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_translatable())
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.with_indices(|idx| idx.by_id.get(id).copied())
    }

    pub fn by_id(&self, id: &str) -> Option<&Unit> {
        self.position_of(id).and_then(|pos| self.units.get(pos))
    }

    pub fn by_id_mut(&mut self, id: &str) -> Option<&mut Unit> {
        let pos = self.position_of(id)?;
        self.units.get_mut(pos)
    }

    /// Positions of every unit whose source hashes to `hash`. Duplicates are allowed.
    pub fn by_source_hash(&self, hash: &str) -> Vec<usize> {
        self.with_indices(|idx| idx.by_source_hash.get(hash).cloned().unwrap_or_default())
    }

    /// First unit whose source equals `source`.
    pub fn find_by_source(&self, source: &MultiString) -> Option<usize> {
        self.by_source_hash(&source.content_hash())
            .into_iter()
            .find(|&pos| self.units[pos].source == *source)
    }

    pub fn push(&mut self, unit: Unit) -> usize {
        self.units.push(unit);
        self.touch();
        self.units.len() - 1
    }

    pub fn remove(&mut self, position: usize) -> Option<Unit> {
        if position >= self.units.len() {
            return None;
        }
        let unit = self.units.remove(position);
        self.touch();
        Some(unit)
    }

    /// Marks the unit list as structurally changed.
    pub fn touch(&mut self) {
        self.generation = next_generation();
    }

    pub fn header(&self) -> Option<Header> {
        self.units
            .iter()
            .find(|u| u.is_header())
            .map(|u| Header::parse(u.target.first()))
    }

    /// Writes `header` into the header unit, inserting one at position 0 when
    /// the file has none. Returns true when a unit was inserted.
    pub fn set_header(&mut self, header: &Header) -> bool {
        let rendered = header.render();
        if let Some(unit) = self.units.iter_mut().find(|u| u.is_header()) {
            unit.target = MultiString::new(rendered);
            return false;
        }
        self.units
            .insert(0, Unit::new("").with_target(rendered));
        self.touch();
        true
    }

    pub fn into_units(self) -> Vec<Unit> {
        self.units
    }

    fn with_indices<R>(&self, f: impl FnOnce(&Indices) -> R) -> R {
        let mut state = self.index.lock();
        let fresh = matches!(&*state, IndexState::Built { generation, .. } if *generation == self.generation);
        if !fresh {
            tracing::trace!(generation = self.generation, units = self.units.len(), "rebuilding unit indices");
            *state = IndexState::Built {
                generation: self.generation,
                indices: self.build_indices(),
            };
        }
        match &*state {
            IndexState::Built { indices, .. } => f(indices),
            IndexState::Unbuilt => f(&Indices::default()),
        }
    }

    fn build_indices(&self) -> Indices {
        let mut indices = Indices::default();
        for (pos, unit) in self.units.iter().enumerate() {
            if unit.is_header() {
                continue;
            }
            // First occurrence wins for duplicate ids.
            indices.by_id.entry(unit.id()).or_insert(pos);
            indices
                .by_source_hash
                .entry(unit.source_hash())
                .or_default()
                .push(pos);
        }
        indices
    }

    #[cfg(test)]
    fn built_generation(&self) -> Option<u64> {
        match &*self.index.lock() {
            IndexState::Built { generation, .. } => Some(*generation),
            IndexState::Unbuilt => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UnitStore {
        UnitStore::new(vec![
            Unit::new("").with_target("Language: sw\n"),
            Unit::new("One fish"),
            Unit::new("Two fish").with_target("Samaki wawili"),
            Unit::new("Open").with_context("menu"),
        ])
    }

    #[test]
    fn test_indices_built_lazily() {
        let s = store();
        assert_eq!(s.built_generation(), None);
        assert_eq!(s.position_of("Two fish"), Some(2));
        assert_eq!(s.built_generation(), Some(s.generation()));
    }

    #[test]
    fn test_lookup_by_id_and_hash() {
        let s = store();
        assert_eq!(s.by_id("menu\u{4}Open").unwrap().source.first(), "Open");
        assert!(s.by_id("Open").is_none());
        let hash = MultiString::new("One fish").content_hash();
        assert_eq!(s.by_source_hash(&hash), vec![1]);
        assert_eq!(s.find_by_source(&MultiString::new("Two fish")), Some(2));
    }

    #[test]
    fn test_header_is_not_indexed() {
        let s = store();
        assert!(s.by_id("").is_none());
        assert_eq!(s.translatable().count(), 3);
    }

    #[test]
    fn test_push_bumps_generation_and_rebuilds() {
        let mut s = store();
        let before = s.generation();
        assert!(s.position_of("Three fish").is_none());

        let pos = s.push(Unit::new("Three fish"));
        assert_eq!(pos, 4);
        assert!(s.generation() > before);
        assert_eq!(s.position_of("Three fish"), Some(4));
        assert_eq!(s.built_generation(), Some(s.generation()));
    }

    #[test]
    fn test_duplicate_sources_are_all_listed() {
        let s = UnitStore::new(vec![
            Unit::new("Same").with_context("a"),
            Unit::new("Same").with_context("b"),
        ]);
        let hash = MultiString::new("Same").content_hash();
        assert_eq!(s.by_source_hash(&hash), vec![0, 1]);
    }

    #[test]
    fn test_set_header_inserts_when_missing() {
        let mut s = UnitStore::new(vec![Unit::new("One fish")]);
        let before = s.generation();
        let mut header = Header::default();
        header.set("Language", "sw");

        assert!(s.set_header(&header));
        assert!(s.generation() > before);
        assert_eq!(s.position_of("One fish"), Some(1));

        header.set("Language", "de");
        assert!(!s.set_header(&header));
        assert_eq!(s.header().unwrap().get("Language"), Some("de"));
    }

    #[test]
    fn test_fresh_stores_never_share_a_generation() {
        let a = UnitStore::default();
        let b = a.clone();
        assert_ne!(a.generation(), b.generation());
    }
}

//! # Search Index
//!
//! An optional inverted index over unit text, one JSON document per store
//! under `<project>/<index_dir>/`. Each store's document records the
//! fingerprint of the file it was built from:
//!
//! - `update(store, fp, rows, None)` with an unchanged fingerprint does nothing.
//! - `update(store, fp, rows, None)` otherwise drops the store's documents and
//!   indexes every row.
//! - `update(store, fp, rows, Some(id))` re-indexes that one row.
//!
//! Indexing is best effort. [`SearchIndex::refresh`] logs failures and
//! disables the index for the failing store; searches against a disabled
//! store return `None` and the caller scans the rows with [`linear_search`].

use crate::error::{Result, SyncError};
use crate::file::write_atomic;
use crate::model::word_count;
use crate::projection::{RowId, UnitRow};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Source,
    Target,
    Notes,
    Locations,
}

impl SearchField {
    pub const ALL: &'static [SearchField] = &[
        SearchField::Source,
        SearchField::Target,
        SearchField::Notes,
        SearchField::Locations,
    ];
}

impl FromStr for SearchField {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(SearchField::Source),
            "target" => Ok(SearchField::Target),
            "notes" => Ok(SearchField::Notes),
            "locations" => Ok(SearchField::Locations),
            other => Err(SyncError::Index(format!("Unknown search field: {}", other))),
        }
    }
}

/// One indexed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDocument {
    pub pootle_path: String,
    pub fingerprint: String,
    pub itemno: usize,
    pub dbid: RowId,
    pub source: String,
    pub target: String,
    pub notes: String,
    pub locations: String,
}

impl UnitDocument {
    fn from_row(pootle_path: &str, fingerprint: &str, row: &UnitRow) -> Self {
        let notes = [row.developer_comment.as_str(), row.translator_comment.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            pootle_path: pootle_path.to_string(),
            fingerprint: fingerprint.to_string(),
            itemno: row.index,
            dbid: row.id,
            source: row.source().variants().join("\n"),
            target: row.target().variants().join("\n"),
            notes,
            locations: row.locations.join(" "),
        }
    }

    fn field(&self, field: SearchField) -> &str {
        match field {
            SearchField::Source => &self.source,
            SearchField::Target => &self.target,
            SearchField::Notes => &self.notes,
            SearchField::Locations => &self.locations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub pootle_path: String,
    pub itemno: usize,
    pub dbid: RowId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexUpdate {
    UpToDate,
    Rebuilt(usize),
    Reindexed,
    Disabled,
}

#[derive(Serialize, Deserialize)]
struct StoreIndex {
    pootle_path: String,
    fingerprint: String,
    documents: Vec<UnitDocument>,
}

struct LoadedIndex {
    store: StoreIndex,
    postings: HashMap<(SearchField, String), BTreeSet<usize>>,
}

impl LoadedIndex {
    fn new(store: StoreIndex) -> Self {
        let mut loaded = Self {
            store,
            postings: HashMap::new(),
        };
        loaded.rebuild_postings();
        loaded
    }

    fn rebuild_postings(&mut self) {
        self.postings.clear();
        for (i, doc) in self.store.documents.iter().enumerate() {
            for &field in SearchField::ALL {
                for token in tokenize(doc.field(field)) {
                    self.postings.entry((field, token)).or_default().insert(i);
                }
            }
        }
    }

    fn query(&self, tokens: &[String], fields: &[SearchField]) -> Vec<SearchHit> {
        let mut result: Option<BTreeSet<usize>> = None;
        for token in tokens {
            let mut matched = BTreeSet::new();
            for &field in fields {
                if let Some(docs) = self.postings.get(&(field, token.clone())) {
                    matched.extend(docs.iter().copied());
                }
            }
            result = Some(match result {
                None => matched,
                Some(acc) => acc.intersection(&matched).copied().collect(),
            });
        }
        result
            .unwrap_or_default()
            .into_iter()
            .map(|i| {
                let doc = &self.store.documents[i];
                SearchHit {
                    pootle_path: doc.pootle_path.clone(),
                    itemno: doc.itemno,
                    dbid: doc.dbid,
                }
            })
            .collect()
    }
}

/// Lowercased words. Dots and colons also split, so `src/win.c:4` yields `src`, `win`, `c`, `4`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .flat_map(|w| w.split(|c| c == '.' || c == ':'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Token-intersection search over rows without an index.
pub fn linear_search(pootle_path: &str, rows: &[UnitRow], query: &str, fields: &[SearchField]) -> Vec<SearchHit> {
    let wanted = tokenize(query);
    if wanted.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<SearchHit> = rows
        .iter()
        .filter(|row| !row.obsolete)
        .filter(|row| {
            let doc = UnitDocument::from_row(pootle_path, "", row);
            let present: HashSet<String> = fields.iter().flat_map(|&f| tokenize(doc.field(f))).collect();
            wanted.iter().all(|t| present.contains(t))
        })
        .map(|row| SearchHit {
            pootle_path: pootle_path.to_string(),
            itemno: row.index,
            dbid: row.id,
        })
        .collect();
    hits.sort_by_key(|h| h.itemno);
    hits
}

pub struct SearchIndex {
    root: PathBuf,
    loaded: Mutex<HashMap<String, LoadedIndex>>,
    disabled: Mutex<HashSet<String>>,
}

impl SearchIndex {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: Mutex::new(HashMap::new()),
            disabled: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_disabled(&self, store: &str) -> bool {
        self.disabled.lock().contains(store)
    }

    pub fn disable(&self, store: &str) {
        self.disabled.lock().insert(store.to_string());
    }

    pub fn enable(&self, store: &str) {
        self.disabled.lock().remove(store);
    }

    fn document_path(&self, store: &str) -> PathBuf {
        let hash = blake3::hash(store.as_bytes()).to_hex();
        self.root.join(format!("{}.json", &hash[..16]))
    }

    fn with_loaded<R>(&self, store: &str, f: impl FnOnce(Option<&mut LoadedIndex>) -> Result<R>) -> Result<R> {
        let mut loaded = self.loaded.lock();
        if !loaded.contains_key(store) {
            let path = self.document_path(store);
            if path.exists() {
                let content = fs::read_to_string(&path).map_err(SyncError::Io)?;
                let doc: StoreIndex = serde_json::from_str(&content)
                    .map_err(|e| SyncError::Index(format!("{}: {}", path.display(), e)))?;
                loaded.insert(store.to_string(), LoadedIndex::new(doc));
            }
        }
        f(loaded.get_mut(store))
    }

    fn persist(&self, index: &StoreIndex) -> Result<()> {
        let bytes = serde_json::to_vec(index).map_err(SyncError::Serialization)?;
        write_atomic(&self.document_path(&index.pootle_path), &bytes)
    }

    /// Brings the documents of `store` up to date with `rows`.
    pub fn update(&self, store: &str, fingerprint: &str, rows: &[UnitRow], unit: Option<RowId>) -> Result<IndexUpdate> {
        if self.is_disabled(store) {
            return Ok(IndexUpdate::Disabled);
        }
        let outcome = self.with_loaded(store, |existing| {
            // Nothing to patch without existing documents.
            let unit = unit.filter(|_| existing.is_some());
            let current = existing.as_ref().map(|l| l.store.fingerprint.as_str());
            if unit.is_none() && current == Some(fingerprint) {
                return Ok((IndexUpdate::UpToDate, None));
            }
            let mut documents = match (unit, existing) {
                (Some(_), Some(loaded)) => std::mem::take(&mut loaded.store.documents),
                _ => Vec::new(),
            };
            let outcome = match unit {
                None => {
                    documents = rows
                        .iter()
                        .filter(|r| !r.obsolete)
                        .map(|r| UnitDocument::from_row(store, fingerprint, r))
                        .collect();
                    IndexUpdate::Rebuilt(documents.len())
                }
                Some(id) => {
                    documents.retain(|d| d.dbid != id);
                    if let Some(row) = rows.iter().find(|r| r.id == id && !r.obsolete) {
                        documents.push(UnitDocument::from_row(store, fingerprint, row));
                    }
                    documents.sort_by_key(|d| d.itemno);
                    IndexUpdate::Reindexed
                }
            };
            let index = StoreIndex {
                pootle_path: store.to_string(),
                fingerprint: fingerprint.to_string(),
                documents,
            };
            Ok((outcome, Some(index)))
        })?;

        let (outcome, index) = outcome;
        if let Some(index) = index {
            let persisted = self.persist(&index);
            let mut loaded = self.loaded.lock();
            match persisted {
                Ok(()) => {
                    loaded.insert(store.to_string(), LoadedIndex::new(index));
                }
                Err(e) => {
                    loaded.remove(store);
                    return Err(e);
                }
            }
            debug!(store, ?outcome, "search index updated");
        }
        Ok(outcome)
    }

    /// [`Self::update`] that never fails: errors disable the store's index.
    pub fn refresh(&self, store: &str, fingerprint: &str, rows: &[UnitRow], unit: Option<RowId>) -> IndexUpdate {
        match self.update(store, fingerprint, rows, unit) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(store, error = %e, "search index update failed, falling back to linear scan");
                self.disable(store);
                IndexUpdate::Disabled
            }
        }
    }

    /// Hits in `store`, or `None` when the store has no usable index.
    pub fn search(&self, store: &str, query: &str, fields: &[SearchField]) -> Option<Vec<SearchHit>> {
        if self.is_disabled(store) {
            return None;
        }
        let tokens = tokenize(query);
        let result = self.with_loaded(store, |loaded| {
            Ok(loaded.map(|l| {
                if tokens.is_empty() {
                    Vec::new()
                } else {
                    l.query(&tokens, fields)
                }
            }))
        });
        match result {
            Ok(hits) => hits,
            Err(e) => {
                warn!(store, error = %e, "search index unreadable, falling back to linear scan");
                self.disable(store);
                None
            }
        }
    }

    /// Drops the documents of `store` from memory and disk.
    pub fn remove_store(&self, store: &str) -> Result<()> {
        self.loaded.lock().remove(store);
        let path = self.document_path(store);
        if path.exists() {
            fs::remove_file(path).map_err(SyncError::Io)?;
        }
        Ok(())
    }

    /// Number of indexed words across the loaded stores.
    pub fn indexed_words(&self) -> u64 {
        self.loaded
            .lock()
            .values()
            .flat_map(|l| l.store.documents.iter())
            .map(|d| word_count(&d.source) + word_count(&d.target))
            .sum()
    }
}

//! # Merge Engine
//!
//! Folds an incoming file (an upload or the pre-update working copy after a
//! version-control pull) into a store without losing work.
//!
//! Each incoming unit lands in one of four states, decided by comparing id
//! sets:
//!
//! | State | Condition | Effect |
//! |-------|-----------|--------|
//! | `New` | id only in incoming | appended iff `allow_new_strings` |
//! | `Removed` | id only in the store | marked obsolete iff `obsolete_missing` |
//! | `MatchedUnchanged` | same target | nothing |
//! | `MatchedChanged` | different target | overwrite, or route to suggestions |
//!
//! A changed target becomes a suggestion when `no_translate` is set, or when
//! `suggestions` is set and the store already has a translation. A blank
//! incoming target never overwrites anything.
//!
//! ## Ordering
//!
//! Every row decision is made inside one projection transaction, committed
//! once. Only then are rows pushed onto the file, the header merged, routed
//! suggestions recorded and the file saved. A failure before the commit
//! leaves both the rows and the file untouched.

use crate::error::Result;
use crate::file::FileHandle;
use crate::model::{Header, MultiString, Unit, HEADER_ORDER};
use crate::projection::{ProjectionBackend, RecordProjection, UnitRow};
use crate::suggestions::SuggestionStore;
use crate::units::UnitStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Header fields the incoming file may always overwrite.
pub const HEADER_ALLOW_LIST: &[&str] = &[
    "Content-Type",
    "POT-Creation-Date",
    "Last-Translator",
    "Project-Id-Version",
    "PO-Revision-Date",
    "Language-Team",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub allow_new_strings: bool,
    pub obsolete_missing: bool,
    /// Treat the incoming file as untrusted: changed translations become suggestions.
    pub suggestions: bool,
    /// Never overwrite a translation; every changed target becomes a suggestion.
    pub no_translate: bool,
    /// Recorded as the suggester and, on direct merges, as `Last-Translator`.
    pub username: Option<String>,
}

impl MergeOptions {
    /// Trusted upload: overwrite translations, add new strings, obsolete missing ones.
    pub fn overwrite() -> Self {
        Self {
            allow_new_strings: true,
            obsolete_missing: true,
            ..Default::default()
        }
    }

    /// Folding a working copy back after a version-control update.
    pub fn version_merge() -> Self {
        Self {
            suggestions: true,
            username: Some("versionmerge".to_string()),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    New,
    Removed,
    MatchedUnchanged,
    MatchedChanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: usize,
    /// New units dropped because `allow_new_strings` was off.
    pub discarded: usize,
    pub obsoleted: usize,
    pub updated: usize,
    pub suggested: usize,
    /// Matched units whose incoming target was blank.
    pub skipped: usize,
    pub unchanged: usize,
    pub header_updated: bool,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.added + self.obsoleted + self.updated + self.suggested > 0 || self.header_updated
    }
}

/// Decides the state of an incoming unit against the store's id set.
pub fn classify(
    incoming: &Unit,
    existing: Option<&UnitRow>,
) -> UnitState {
    match existing {
        None => UnitState::New,
        Some(row) if row.target() == &incoming.target => UnitState::MatchedUnchanged,
        Some(_) => UnitState::MatchedChanged,
    }
}

/// Our header with the incoming fields that may replace it applied.
pub fn merge_header(ours: &Header, theirs: &Header) -> Header {
    let mut merged = ours.clone();
    for (key, value) in theirs.fields() {
        let ours_empty = ours.get(key).map_or(true, str::is_empty);
        let allowed = HEADER_ALLOW_LIST.contains(&key.as_str())
            || (ours_empty && HEADER_ORDER.contains(&key.as_str()));
        if allowed {
            merged.set(key, value.clone());
        }
    }
    merged
}

/// Merges `incoming` into the store backed by `handle` and the rows of `store`.
///
/// The caller holds the store lock, has pulled the file into the projection
/// and is responsible for cache invalidation afterwards.
pub fn merge_units<B: ProjectionBackend>(
    projection: &RecordProjection<B>,
    store: &str,
    handle: &mut FileHandle,
    suggestions: &mut SuggestionStore,
    incoming: &UnitStore,
    options: &MergeOptions,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    let mut txn = projection.begin(store)?;
    txn.pull(handle.units());

    let old_ids: HashSet<String> = handle.units().translatable().map(|(_, u)| u.id()).collect();
    let mut new_ids: HashSet<String> = HashSet::new();
    let mut appended: Vec<Unit> = Vec::new();
    let mut routed: Vec<(String, MultiString)> = Vec::new();
    let mut relocated: Vec<(String, &[String])> = Vec::new();
    let route_new = options.suggestions || options.no_translate;

    for (_, unit) in incoming.translatable() {
        let unitid = unit.id();
        if !new_ids.insert(unitid.clone()) {
            continue;
        }
        let existing = if old_ids.contains(&unitid) { txn.get(&unitid) } else { None };
        match classify(unit, existing) {
            UnitState::New => {
                if !options.allow_new_strings {
                    report.discarded += 1;
                    continue;
                }
                let mut fresh = unit.clone();
                fresh.alternates.clear();
                if route_new && !unit.target.is_empty() {
                    fresh.target = MultiString::empty();
                    fresh.fuzzy = false;
                    routed.push((unitid.clone(), unit.target.clone()));
                }
                let index = handle.units().len() + appended.len();
                // A row left behind by an earlier removal is revived rather than duplicated.
                let revived = txn.modify(&unitid, |row| {
                    row.update_from_unit(index, &fresh);
                    true
                });
                if revived.is_none() {
                    let id = txn.allocate_id();
                    txn.insert(UnitRow::from_unit(id, index, &fresh));
                }
                appended.push(fresh);
                report.added += 1;
            }
            UnitState::MatchedUnchanged => {
                let existing_translated = existing.map_or(false, UnitRow::is_translated);
                let trusted = !options.no_translate && !(options.suggestions && existing_translated);
                if !trusted || unit.target.is_empty() {
                    report.unchanged += 1;
                    continue;
                }
                // Same target, but flags, comments or locations may still differ.
                if txn.modify(&unitid, |row| merge_row(row, unit)) == Some(true) {
                    report.updated += 1;
                    relocated.push((unitid, unit.locations.as_slice()));
                } else {
                    report.unchanged += 1;
                }
            }
            UnitState::MatchedChanged if unit.target.is_empty() => report.skipped += 1,
            UnitState::MatchedChanged => {
                let existing_translated = existing.map_or(false, UnitRow::is_translated);
                if options.no_translate || (options.suggestions && existing_translated) {
                    routed.push((unitid, unit.target.clone()));
                    continue;
                }
                txn.modify(&unitid, |row| merge_row(row, unit));
                relocated.push((unitid, unit.locations.as_slice()));
                report.updated += 1;
            }
            UnitState::Removed => {}
        }
    }

    if options.obsolete_missing {
        for unitid in old_ids.difference(&new_ids) {
            let changed = txn.modify(unitid, |row| {
                if row.obsolete {
                    return false;
                }
                row.obsolete = true;
                row.mtime = Utc::now();
                true
            });
            if changed == Some(true) {
                report.obsoleted += 1;
            }
        }
    }

    let pushed = {
        let committed = txn.commit()?;
        debug!(store, committed, "merge rows committed");
        let rows = projection.rows(store)?;
        for unit in appended {
            handle.units_mut().push(unit);
        }
        let mut pushed = crate::projection::push_rows(&rows, handle.units_mut());
        // Rows only write translator fields back, so locations go onto the units here.
        for (unitid, locations) in relocated {
            let Some(unit) = handle.units_mut().by_id_mut(&unitid) else {
                continue;
            };
            if !locations.is_empty() && unit.locations != locations {
                unit.locations = locations.to_vec();
                pushed += 1;
            }
        }
        pushed
    };

    let incoming_header = incoming.header();
    if !options.suggestions && handle.format().supports_header() {
        if let Some(theirs) = incoming_header {
            let ours = handle.units().header().unwrap_or_default();
            let merged = merge_header(&ours, &theirs);
            if merged != ours {
                handle.units_mut().set_header(&merged);
                report.header_updated = true;
            }
        }
    }

    let template = handle.units().header();
    let author = options.username.as_deref();
    for (unitid, target) in routed {
        let Some(unit) = handle.units_mut().by_id_mut(&unitid) else {
            continue;
        };
        match suggestions.add(unit, target, author, template.as_ref()) {
            Ok(true) => report.suggested += 1,
            Ok(false) => {}
            Err(err) => {
                handle.discard_changes();
                return Err(err);
            }
        }
    }

    let file_changed = pushed > 0 || report.added > 0 || report.header_updated
        || (suggestions.is_embedded() && report.suggested > 0);
    if file_changed {
        handle.save_or_reload()?;
        projection.pull_from_file(store, handle.units())?;
    }
    suggestions.save()?;

    info!(store, ?report, "merged incoming file");
    Ok(report)
}

/// Copies the incoming target and metadata onto `row`. Returns whether anything changed.
fn merge_row(row: &mut UnitRow, incoming: &Unit) -> bool {
    let mut changed = false;
    if row.target() != &incoming.target {
        row.set_target(incoming.target.clone());
        changed = true;
    }
    if row.fuzzy != incoming.fuzzy {
        row.fuzzy = incoming.fuzzy;
        changed = true;
    }
    if row.obsolete != incoming.obsolete {
        row.obsolete = incoming.obsolete;
        changed = true;
    }
    if !incoming.translator_comment.is_empty() && row.translator_comment != incoming.translator_comment {
        row.translator_comment = incoming.translator_comment.clone();
        changed = true;
    }
    if !incoming.locations.is_empty() && row.locations != incoming.locations {
        row.locations = incoming.locations.clone();
        changed = true;
    }
    if changed {
        row.mtime = Utc::now();
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PoFormat;
    use crate::format::{FormatError, TranslationFormat};
    use crate::model::ParsedFile;
    use crate::projection::MemBackend;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const STORE: &str = "/sw/demo/app.po";

    const OURS: &str = "msgid \"\"\nmsgstr \"\"\n\"Project-Id-Version: demo 1\\n\"\n\"Language: sw\\n\"\n\nmsgid \"One fish\"\nmsgstr \"\"\n\nmsgid \"Two fish\"\nmsgstr \"Samaki wawili\"\n\nmsgid \"Red fish\"\nmsgstr \"Samaki mwekundu\"\n";

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        handle: FileHandle,
        projection: RecordProjection<MemBackend>,
        suggestions: SuggestionStore,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.po");
        fs::write(&path, OURS).unwrap();
        let handle = FileHandle::open(&path, &[]).unwrap();
        let projection = RecordProjection::with_backend(MemBackend::new());
        projection.pull_from_file(STORE, handle.units()).unwrap();
        let suggestions = SuggestionStore::side_file(dir.path().join("app.po.pending"));
        Fixture {
            _dir: dir,
            path,
            handle,
            projection,
            suggestions,
        }
    }

    fn incoming(text: &str) -> UnitStore {
        UnitStore::from(PoFormat.parse(text.as_bytes()).unwrap())
    }

    fn merge(f: &mut Fixture, text: &str, options: &MergeOptions) -> MergeReport {
        merge_units(
            &f.projection,
            STORE,
            &mut f.handle,
            &mut f.suggestions,
            &incoming(text),
            options,
        )
        .unwrap()
    }

    fn target_of(f: &Fixture, id: &str) -> String {
        f.handle.units().by_id(id).unwrap().target.first().to_string()
    }

    #[test]
    fn test_merge_header_allow_list() {
        let ours = Header::parse("Project-Id-Version: demo 1\nLanguage: sw\nX-Custom: keep\n");
        let theirs = Header::parse("Project-Id-Version: demo 2\nLanguage: de\nMIME-Version: 1.0\nX-Custom: drop\n");
        let merged = merge_header(&ours, &theirs);
        assert_eq!(merged.get("Project-Id-Version"), Some("demo 2"));
        assert_eq!(merged.get("Language"), Some("sw"));
        assert_eq!(merged.get("MIME-Version"), Some("1.0"));
        assert_eq!(merged.get("X-Custom"), Some("keep"));
    }

    #[test]
    fn test_new_unit_needs_allow_new_strings() {
        let text = format!("{}\nmsgid \"Blue fish\"\nmsgstr \"\"\n", OURS);

        let mut f = fixture();
        let report = merge(&mut f, &text, &MergeOptions::default());
        assert_eq!(report.discarded, 1);
        assert_eq!(f.projection.rows(STORE).unwrap().len(), 3);
        assert!(f.handle.units().by_id("Blue fish").is_none());

        let mut f = fixture();
        let options = MergeOptions {
            allow_new_strings: true,
            ..Default::default()
        };
        let report = merge(&mut f, &text, &options);
        assert_eq!(report.added, 1);
        let rows = f.projection.rows(STORE).unwrap();
        assert_eq!(rows.len(), 4);
        let blue = rows.iter().find(|r| r.unitid == "Blue fish").unwrap();
        assert!(blue.target().is_empty());
        assert_eq!(blue.index, 4);
        assert!(fs::read_to_string(&f.path).unwrap().contains("msgid \"Blue fish\""));
    }

    #[test]
    fn test_direct_merge_overwrites_translations() {
        let mut f = fixture();
        let text = OURS
            .replace("msgid \"One fish\"\nmsgstr \"\"", "msgid \"One fish\"\nmsgstr \"Samaki mmoja\"")
            .replace("Samaki wawili", "Samaki wawili tu");
        let report = merge(&mut f, &text, &MergeOptions::overwrite());
        assert_eq!(report.updated, 2);
        assert_eq!(report.unchanged, 1);
        assert_eq!(target_of(&f, "One fish"), "Samaki mmoja");
        assert_eq!(target_of(&f, "Two fish"), "Samaki wawili tu");

        let reread = FileHandle::open(&f.path, &[]).unwrap();
        assert_eq!(reread.units().by_id("Two fish").unwrap().target.first(), "Samaki wawili tu");
    }

    #[test]
    fn test_trusted_merge_applies_flags_on_equal_target() {
        let mut f = fixture();
        let text = OURS.replace("msgid \"Two fish\"", "#, fuzzy\nmsgid \"Two fish\"");
        let report = merge(&mut f, &text, &MergeOptions::overwrite());
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 2);
        assert!(f.handle.units().by_id("Two fish").unwrap().fuzzy);
        assert!(fs::read_to_string(&f.path).unwrap().contains("#, fuzzy\nmsgid \"Two fish\""));

        // Clearing the flag again goes through the same path.
        let report = merge(&mut f, OURS, &MergeOptions::overwrite());
        assert_eq!(report.updated, 1);
        assert!(!f.handle.units().by_id("Two fish").unwrap().fuzzy);
    }

    #[test]
    fn test_trusted_merge_moves_locations_on_equal_target() {
        let mut f = fixture();
        let text = OURS.replace("msgid \"Red fish\"", "#: src/red.c:9\nmsgid \"Red fish\"");
        let report = merge(&mut f, &text, &MergeOptions::overwrite());
        assert_eq!(report.updated, 1);
        assert_eq!(f.handle.units().by_id("Red fish").unwrap().locations, vec!["src/red.c:9"]);
        assert!(fs::read_to_string(&f.path).unwrap().contains("#: src/red.c:9\nmsgid \"Red fish\""));
    }

    #[test]
    fn test_untrusted_merge_ignores_flags_on_equal_target() {
        let mut f = fixture();
        let text = OURS.replace("msgid \"Two fish\"", "#, fuzzy\nmsgid \"Two fish\"");
        let options = MergeOptions {
            suggestions: true,
            ..Default::default()
        };
        let report = merge(&mut f, &text, &options);
        assert_eq!(report.updated, 0);
        assert!(!f.handle.units().by_id("Two fish").unwrap().fuzzy);
    }

    #[test]
    fn test_untrusted_merge_routes_changes_to_suggestions() {
        let mut f = fixture();
        let text = OURS
            .replace("msgid \"One fish\"\nmsgstr \"\"", "msgid \"One fish\"\nmsgstr \"Samaki mmoja\"")
            .replace("Samaki wawili", "Samaki wawili tu");
        let options = MergeOptions::default().with_username("juma");
        let options = MergeOptions {
            suggestions: true,
            ..options
        };
        let report = merge(&mut f, &text, &options);

        // Empty target is filled directly, existing translation is preserved.
        assert_eq!(report.updated, 1);
        assert_eq!(report.suggested, 1);
        assert_eq!(target_of(&f, "One fish"), "Samaki mmoja");
        assert_eq!(target_of(&f, "Two fish"), "Samaki wawili");

        let two = f.handle.units().by_id("Two fish").unwrap().clone();
        let pending = f.suggestions.list_for(&two).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].target.first(), "Samaki wawili tu");
        assert_eq!(pending[0].author.as_deref(), Some("juma"));
    }

    #[test]
    fn test_no_translate_routes_everything() {
        let mut f = fixture();
        let text = OURS.replace("msgid \"One fish\"\nmsgstr \"\"", "msgid \"One fish\"\nmsgstr \"Samaki mmoja\"");
        let options = MergeOptions {
            no_translate: true,
            ..Default::default()
        };
        let report = merge(&mut f, &text, &options);
        assert_eq!(report.suggested, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(target_of(&f, "One fish"), "");
    }

    #[test]
    fn test_blank_incoming_target_is_skipped() {
        let mut f = fixture();
        let text = OURS.replace("Samaki wawili", "");
        let report = merge(&mut f, &text, &MergeOptions::overwrite());
        assert_eq!(report.skipped, 1);
        assert_eq!(target_of(&f, "Two fish"), "Samaki wawili");
    }

    #[test]
    fn test_obsolete_missing() {
        let text = "msgid \"One fish\"\nmsgstr \"\"\n\nmsgid \"Two fish\"\nmsgstr \"Samaki wawili\"\n";

        let mut f = fixture();
        let report = merge(&mut f, text, &MergeOptions::default());
        assert_eq!(report.obsoleted, 0);
        assert!(!f.handle.units().by_id("Red fish").unwrap().obsolete);

        let mut f = fixture();
        let report = merge(&mut f, text, &MergeOptions::overwrite());
        assert_eq!(report.obsoleted, 1);
        assert!(f.handle.units().by_id("Red fish").unwrap().obsolete);
        assert!(fs::read_to_string(&f.path).unwrap().contains("#~ msgid \"Red fish\""));
    }

    #[test]
    fn test_header_merge_skipped_for_untrusted_input() {
        let text = OURS.replace("demo 1", "demo 2");

        let mut f = fixture();
        let options = MergeOptions {
            suggestions: true,
            ..Default::default()
        };
        assert!(!merge(&mut f, &text, &options).header_updated);

        let mut f = fixture();
        let report = merge(&mut f, &text, &MergeOptions::default());
        assert!(report.header_updated);
        assert_eq!(
            f.handle.units().header().unwrap().get("Project-Id-Version"),
            Some("demo 2")
        );
    }

    #[test]
    fn test_identical_file_changes_nothing() {
        let mut f = fixture();
        let saves = f.projection.backend().save_count();
        let before = fs::read_to_string(&f.path).unwrap();
        let report = merge(&mut f, OURS, &MergeOptions::overwrite());
        assert!(!report.changed());
        assert_eq!(report.unchanged, 3);
        assert_eq!(f.projection.backend().save_count(), saves);
        assert_eq!(fs::read_to_string(&f.path).unwrap(), before);
    }

    #[test]
    fn test_failed_commit_leaves_file_untouched() {
        let mut f = fixture();
        let before = fs::read_to_string(&f.path).unwrap();
        f.projection.backend().set_simulate_write_error(true);
        let text = OURS.replace("Samaki wawili", "Samaki wawili tu");
        let result = merge_units(
            &f.projection,
            STORE,
            &mut f.handle,
            &mut f.suggestions,
            &incoming(&text),
            &MergeOptions::overwrite(),
        );
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&f.path).unwrap(), before);
        assert_eq!(target_of(&f, "Two fish"), "Samaki wawili");
    }

    /// PO reader whose writes fail while `fail` is set.
    struct FlakyWriter {
        fail: Arc<AtomicBool>,
    }

    impl TranslationFormat for FlakyWriter {
        fn name(&self) -> &'static str {
            "po"
        }

        fn parse(&self, bytes: &[u8]) -> std::result::Result<ParsedFile, FormatError> {
            PoFormat.parse(bytes)
        }

        fn serialize(&self, units: &[Unit]) -> std::result::Result<Vec<u8>, FormatError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(FormatError::Syntax {
                    line: 0,
                    message: "disk full".into(),
                });
            }
            PoFormat.serialize(units)
        }

        fn supports_header(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_failed_save_keeps_rows_for_next_push() {
        let mut f = fixture();
        let fail = Arc::new(AtomicBool::new(true));
        f.handle = FileHandle::with_format(&f.path, Box::new(FlakyWriter { fail: fail.clone() })).unwrap();
        let text = OURS.replace("Samaki wawili", "Samaki wawili tu");

        let result = merge_units(
            &f.projection,
            STORE,
            &mut f.handle,
            &mut f.suggestions,
            &incoming(&text),
            &MergeOptions::overwrite(),
        );
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&f.path).unwrap(), OURS);
        assert_eq!(target_of(&f, "Two fish"), "Samaki wawili");
        let row = f.projection.rows(STORE).unwrap().into_iter().find(|r| r.unitid == "Two fish").unwrap();
        assert_eq!(row.target().first(), "Samaki wawili tu");

        fail.store(false, Ordering::SeqCst);
        assert_eq!(f.projection.push_to_file(STORE, f.handle.units_mut()).unwrap(), 1);
        f.handle.save().unwrap();
        assert!(fs::read_to_string(&f.path).unwrap().contains("Samaki wawili tu"));
    }
}

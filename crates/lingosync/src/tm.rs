//! Translation-memory side file (`<file>.tm`).
//!
//! Produced by external tooling. Entries are offered as suggestions for units
//! that come from exactly the same source locations. The file is parsed on
//! first use and re-parsed only when its fingerprint changes.

use crate::error::Result;
use crate::file::FileHandle;
use crate::format::PoFormat;
use crate::model::Unit;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct TranslationMemory {
    path: PathBuf,
    handle: Option<FileHandle>,
}

impl TranslationMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Translated entries whose locations equal `unit`'s locations.
    pub fn suggestions_for(&mut self, unit: &Unit) -> Result<Vec<Unit>> {
        if unit.locations.is_empty() || !self.refresh()? {
            return Ok(Vec::new());
        }
        let Some(handle) = &self.handle else {
            return Ok(Vec::new());
        };
        Ok(handle
            .units()
            .translatable()
            .map(|(_, tm)| tm)
            .filter(|tm| tm.is_translated() && tm.locations == unit.locations)
            .cloned()
            .collect())
    }

    fn refresh(&mut self) -> Result<bool> {
        if !self.path.exists() {
            self.handle = None;
            return Ok(false);
        }
        match &mut self.handle {
            Some(handle) => {
                if handle.reload_if_stale()? {
                    debug!(path = %self.path.display(), "reloaded translation memory");
                }
            }
            None => {
                self.handle = Some(FileHandle::with_format(&self.path, Box::new(PoFormat))?);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TM: &str = "#: src/a.c:1\nmsgid \"Fish\"\nmsgstr \"Samaki\"\n\n#: src/a.c:1\nmsgid \"Fishes\"\nmsgstr \"\"\n\n#: src/b.c:9\nmsgid \"Fish\"\nmsgstr \"Nyama\"\n";

    #[test]
    fn test_matches_on_locations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sw.po.tm");
        fs::write(&path, TM).unwrap();
        let mut tm = TranslationMemory::new(&path);

        let unit = Unit::new("Fish").with_locations(["src/a.c:1"]);
        let hits = tm.suggestions_for(&unit).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target.first(), "Samaki");

        let nowhere = Unit::new("Fish");
        assert!(tm.suggestions_for(&nowhere).unwrap().is_empty());
    }

    #[test]
    fn test_missing_tm_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let mut tm = TranslationMemory::new(dir.path().join("none.po.tm"));
        let unit = Unit::new("Fish").with_locations(["src/a.c:1"]);
        assert!(tm.suggestions_for(&unit).unwrap().is_empty());
        assert!(!tm.exists());
    }
}

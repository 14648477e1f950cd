//! # Pending Suggestions
//!
//! Unapproved translations proposed for a unit. Where they live depends on
//! the primary file's format:
//!
//! - **Embedded**: the format supports alternates (JSON). Suggestions are
//!   [`Alternate`]s on the unit itself and are persisted when the primary
//!   file is saved.
//! - **Side file**: everything else (PO). Suggestions are entries of
//!   `<file>.pending`, matched to the primary unit by source text. The
//!   suggester is recorded as a `suggested by NAME` comment. The side file is
//!   created on the first suggestion, never on a read.
//!
//! ## Duplicates
//!
//! A suggestion whose target equals the unit's current target, or the target
//! of any suggestion already pending for that unit, is silently ignored.
//!
//! ## Deletion
//!
//! Suggestions are addressed by their position in [`SuggestionStore::list_for`].
//! When the target at that position is not the expected one (the list changed
//! since the caller read it), the first suggestion with the expected target
//! is removed instead. Two suggestions with identical text cannot be told
//! apart; that case is logged.

use crate::error::Result;
use crate::file::FileHandle;
use crate::format::PoFormat;
use crate::model::{Alternate, Header, MultiString, Unit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

static SUGGESTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^suggested by (.+)$").expect("valid suggester pattern"));

/// Extracts the author from a `suggested by NAME` line in `comment`.
pub fn parse_suggester(comment: &str) -> Option<String> {
    SUGGESTER_RE
        .captures(comment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Position within the unit's suggestion list.
    pub position: usize,
    pub target: MultiString,
    pub author: Option<String>,
}

enum Mode {
    Embedded,
    SideFile {
        path: PathBuf,
        handle: Option<FileHandle>,
        dirty: bool,
    },
}

pub struct SuggestionStore {
    mode: Mode,
}

impl SuggestionStore {
    pub fn embedded() -> Self {
        Self {
            mode: Mode::Embedded,
        }
    }

    pub fn side_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::SideFile {
                path: path.into(),
                handle: None,
                dirty: false,
            },
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.mode, Mode::Embedded)
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.mode {
            Mode::Embedded => None,
            Mode::SideFile { path, .. } => Some(path),
        }
    }

    /// Loads the side file if it exists, creating it (with a header derived
    /// from `template`) when `create` is set. Returns whether a side file is
    /// available afterwards. Always true in embedded mode.
    pub fn init_pending(&mut self, create: bool, template: Option<&Header>) -> Result<bool> {
        let Mode::SideFile { path, handle, .. } = &mut self.mode else {
            return Ok(true);
        };
        if let Some(h) = handle.as_mut() {
            if h.reload_if_stale()? {
                debug!(path = %path.display(), "reloaded pending file");
            }
            return Ok(true);
        }
        if path.exists() {
            *handle = Some(FileHandle::with_format(path, Box::new(PoFormat))?);
            return Ok(true);
        }
        if !create {
            return Ok(false);
        }

        let mut header = Header::default();
        if let Some(template) = template {
            for key in ["Project-Id-Version", "Language", "Plural-Forms"] {
                if let Some(value) = template.get(key) {
                    header.set(key, value);
                }
            }
        }
        header.set("Content-Type", "text/plain; charset=UTF-8");
        header.set("Content-Transfer-Encoding", "8bit");
        header.set("X-Generator", generator());
        let header_unit = Unit::new("").with_target(header.render());
        debug!(path = %path.display(), "creating pending file");
        *handle = Some(FileHandle::create(path, Box::new(PoFormat), vec![header_unit])?);
        Ok(true)
    }

    /// Suggestions pending for `unit`, in stored order.
    pub fn list_for(&mut self, unit: &Unit) -> Result<Vec<Suggestion>> {
        if self.is_embedded() {
            return Ok(unit
                .alternates
                .iter()
                .enumerate()
                .map(|(position, alt)| Suggestion {
                    position,
                    target: alt.target.clone(),
                    author: alt.origin.clone(),
                })
                .collect());
        }
        if !self.init_pending(false, None)? {
            return Ok(Vec::new());
        }
        let Some(handle) = self.handle() else {
            return Ok(Vec::new());
        };
        let units = handle.units();
        Ok(side_positions(handle, &unit.source)
            .into_iter()
            .enumerate()
            .filter_map(|(position, pos)| {
                let pending = units.get(pos)?;
                Some(Suggestion {
                    position,
                    target: pending.target.clone(),
                    author: suggester(pending),
                })
            })
            .collect())
    }

    /// Records a suggestion. Returns false (and changes nothing) for blank
    /// targets and duplicates.
    ///
    /// In embedded mode `unit` receives the alternate and the caller must
    /// save the primary file. In side-file mode `unit` is only read.
    pub fn add(
        &mut self,
        unit: &mut Unit,
        target: MultiString,
        author: Option<&str>,
        template: Option<&Header>,
    ) -> Result<bool> {
        if target.is_empty() || target == unit.target {
            return Ok(false);
        }
        if self.list_for(unit)?.iter().any(|s| s.target == target) {
            debug!(unitid = %unit.id(), "ignoring duplicate suggestion");
            return Ok(false);
        }

        if self.is_embedded() {
            unit.alternates.push(Alternate {
                target,
                origin: author.map(str::to_string),
            });
            return Ok(true);
        }

        self.init_pending(true, template)?;
        let mut pending = Unit::new(unit.source.clone()).with_target(target);
        pending.context = unit.context.clone();
        pending.locations = unit.locations.clone();
        pending.origin = author.map(str::to_string);
        if let Mode::SideFile {
            handle: Some(handle),
            dirty,
            ..
        } = &mut self.mode
        {
            handle.units_mut().push(pending);
            *dirty = true;
        }
        Ok(true)
    }

    /// Removes the suggestion at `position`, falling back to the first one
    /// whose target is `expected`. Failures are logged, never returned.
    pub fn remove(&mut self, unit: &mut Unit, position: usize, expected: &MultiString) -> Result<bool> {
        let current = self.list_for(unit)?;
        let Some(chosen) = pick_for_removal(&current, position, expected) else {
            error!(unitid = %unit.id(), position, "no pending suggestion matches, nothing removed");
            return Ok(false);
        };

        match &mut self.mode {
            Mode::Embedded => {
                unit.alternates.remove(chosen);
            }
            Mode::SideFile {
                handle: Some(handle),
                dirty,
                ..
            } => {
                let positions = side_positions(handle, &unit.source);
                if let Some(&pos) = positions.get(chosen) {
                    handle.units_mut().remove(pos);
                    *dirty = true;
                }
            }
            Mode::SideFile { handle: None, .. } => return Ok(false),
        }
        Ok(true)
    }

    /// Removes every suggestion pending for `unit`.
    pub fn clear_for(&mut self, unit: &mut Unit) -> Result<usize> {
        if self.is_embedded() {
            let n = unit.alternates.len();
            unit.alternates.clear();
            return Ok(n);
        }
        if !self.init_pending(false, None)? {
            return Ok(0);
        }
        let Mode::SideFile {
            handle: Some(handle),
            dirty,
            ..
        } = &mut self.mode
        else {
            return Ok(0);
        };
        let mut positions = side_positions(handle, &unit.source);
        positions.sort_unstable_by(|a, b| b.cmp(a));
        for pos in &positions {
            handle.units_mut().remove(*pos);
        }
        if !positions.is_empty() {
            *dirty = true;
        }
        Ok(positions.len())
    }

    /// Total suggestions in the side file. Embedded stores count alternates on the units instead.
    pub fn pending_count(&mut self) -> Result<usize> {
        if self.is_embedded() || !self.init_pending(false, None)? {
            return Ok(0);
        }
        Ok(self
            .handle()
            .map(|h| h.units().translatable().count())
            .unwrap_or(0))
    }

    /// Writes the side file if it changed. No-op in embedded mode.
    pub fn save(&mut self) -> Result<()> {
        if let Mode::SideFile {
            handle: Some(handle),
            dirty,
            ..
        } = &mut self.mode
        {
            if *dirty {
                handle.save()?;
                *dirty = false;
            }
        }
        Ok(())
    }

    fn handle(&self) -> Option<&FileHandle> {
        match &self.mode {
            Mode::SideFile { handle, .. } => handle.as_ref(),
            Mode::Embedded => None,
        }
    }
}

/// Author of a pending entry: its origin, else a `suggested by` comment.
pub fn suggester(unit: &Unit) -> Option<String> {
    unit.origin
        .clone()
        .or_else(|| parse_suggester(&unit.developer_comment))
        .or_else(|| parse_suggester(&unit.translator_comment))
}

fn side_positions(handle: &FileHandle, source: &MultiString) -> Vec<usize> {
    let units = handle.units();
    let mut positions: Vec<usize> = units
        .by_source_hash(&source.content_hash())
        .into_iter()
        .filter(|&pos| units.get(pos).map_or(false, |u| u.source == *source))
        .collect();
    positions.sort_unstable();
    positions
}

/// Index into `current` of the suggestion to act on: `position` when its
/// target still matches, else the first suggestion with target `expected`.
pub fn pick_for_removal(current: &[Suggestion], position: usize, expected: &MultiString) -> Option<usize> {
    if let Some(s) = current.get(position) {
        if s.target == *expected {
            return Some(position);
        }
    }
    let matches: Vec<usize> = current
        .iter()
        .filter(|s| s.target == *expected)
        .map(|s| s.position)
        .collect();
    debug!(position, candidates = matches.len(), "suggestion position is stale, searching by target");
    if matches.len() > 1 {
        warn!(position, candidates = matches.len(), "several suggestions share this target, removing the first");
    }
    matches.first().copied()
}

pub(crate) fn generator() -> String {
    format!("lingosync {}", env!("CARGO_PKG_VERSION"))
}

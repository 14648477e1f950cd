use crate::model::{MultiString, Unit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable identifier of a row, unique within its store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The projection of one translatable unit.
///
/// Source and target are private: their setters recompute the hash, word
/// count and length in the same call, so the denormalized columns always
/// describe the current text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRow {
    pub id: RowId,
    /// Position of the unit in the file at the last sync.
    pub index: usize,
    pub unitid: String,
    source: MultiString,
    source_hash: String,
    source_wordcount: u64,
    source_length: u64,
    target: MultiString,
    target_wordcount: u64,
    target_length: u64,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub developer_comment: String,
    #[serde(default)]
    pub translator_comment: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub obsolete: bool,
    pub mtime: DateTime<Utc>,
}

/// Fields a translator may change on a single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitUpdate {
    pub target: Option<MultiString>,
    pub translator_comment: Option<String>,
    pub fuzzy: Option<bool>,
}

impl UnitUpdate {
    pub fn target(target: impl Into<MultiString>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = Some(fuzzy);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.translator_comment = Some(comment.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.translator_comment.is_none() && self.fuzzy.is_none()
    }
}

impl UnitRow {
    pub fn from_unit(id: RowId, index: usize, unit: &Unit) -> Self {
        let mut row = Self {
            id,
            index,
            unitid: unit.id(),
            source: MultiString::empty(),
            source_hash: String::new(),
            source_wordcount: 0,
            source_length: 0,
            target: MultiString::empty(),
            target_wordcount: 0,
            target_length: 0,
            context: unit.context.clone(),
            developer_comment: unit.developer_comment.clone(),
            translator_comment: unit.translator_comment.clone(),
            locations: unit.locations.clone(),
            fuzzy: unit.fuzzy,
            obsolete: unit.obsolete,
            mtime: Utc::now(),
        };
        row.set_source(unit.source.clone());
        row.set_target(unit.target.clone());
        row
    }

    pub fn source(&self) -> &MultiString {
        &self.source
    }

    pub fn target(&self) -> &MultiString {
        &self.target
    }

    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    pub fn source_wordcount(&self) -> u64 {
        self.source_wordcount
    }

    pub fn source_length(&self) -> u64 {
        self.source_length
    }

    pub fn target_wordcount(&self) -> u64 {
        self.target_wordcount
    }

    pub fn target_length(&self) -> u64 {
        self.target_length
    }

    pub fn set_source(&mut self, source: MultiString) {
        self.source_hash = source.content_hash();
        self.source_wordcount = source.word_count();
        self.source_length = source.char_count();
        self.source = source;
    }

    pub fn set_target(&mut self, target: MultiString) {
        self.target_wordcount = target.word_count();
        self.target_length = target.char_count();
        self.target = target;
    }

    pub fn is_translated(&self) -> bool {
        !self.target.is_empty()
    }

    /// Copies the file's view of the unit onto the row. Returns whether anything changed.
    pub fn update_from_unit(&mut self, index: usize, unit: &Unit) -> bool {
        let mut changed = false;
        if self.index != index {
            self.index = index;
            changed = true;
        }
        if self.source != unit.source {
            self.set_source(unit.source.clone());
            changed = true;
        }
        if self.target != unit.target {
            self.set_target(unit.target.clone());
            changed = true;
        }
        changed |= replace(&mut self.context, &unit.context);
        changed |= replace(&mut self.developer_comment, &unit.developer_comment);
        changed |= replace(&mut self.translator_comment, &unit.translator_comment);
        changed |= replace(&mut self.locations, &unit.locations);
        changed |= replace(&mut self.fuzzy, &unit.fuzzy);
        changed |= replace(&mut self.obsolete, &unit.obsolete);
        if changed {
            self.mtime = Utc::now();
        }
        changed
    }

    /// Writes the translator-owned fields onto the in-memory unit.
    pub fn sync_onto(&self, unit: &mut Unit) -> bool {
        let mut changed = false;
        changed |= replace(&mut unit.target, &self.target);
        changed |= replace(&mut unit.translator_comment, &self.translator_comment);
        changed |= replace(&mut unit.fuzzy, &self.fuzzy);
        changed |= replace(&mut unit.obsolete, &self.obsolete);
        changed
    }

    pub fn apply_update(&mut self, update: &UnitUpdate) -> bool {
        let mut changed = false;
        if let Some(target) = &update.target {
            if *target != self.target {
                self.set_target(target.clone());
                changed = true;
            }
        }
        if let Some(comment) = &update.translator_comment {
            changed |= replace(&mut self.translator_comment, comment);
        }
        if let Some(fuzzy) = update.fuzzy {
            changed |= replace(&mut self.fuzzy, &fuzzy);
        }
        if changed {
            self.mtime = Utc::now();
        }
        changed
    }
}

fn replace<T: PartialEq + Clone>(slot: &mut T, value: &T) -> bool {
    if slot == value {
        return false;
    }
    *slot = value.clone();
    true
}

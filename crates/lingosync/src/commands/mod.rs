//! # Command Layer
//!
//! The operations a user can ask for, each in its own submodule, as plain
//! functions over a [`TranslationProject`](crate::project::TranslationProject).
//!
//! Commands return a [`CmdResult`]: the rows, statistics, suggestions or
//! search hits the operation produced, plus leveled messages. They do no
//! terminal I/O and know nothing of arguments or exit codes; the CLI decides
//! how to render the result. Permission checks happen one level up, in
//! [`crate::api`].
//!
//! - [`stats`]: quick or complete statistics for a store or directory
//! - [`units`]: list the rows of a store
//! - [`update`]: edit a unit, sync rows to files
//! - [`suggest`]: add, list, delete and accept suggestions
//! - [`merge`]: merge an uploaded file into a store
//! - [`vcs`]: update from and commit to version control
//! - [`search`]: search unit text, rebuild the index
//! - [`doctor`]: repair the database

use crate::merge::MergeReport;
use crate::projection::UnitRow;
use crate::search::SearchHit;
use crate::stats::{Counts, QuickStats};
use crate::suggestions::Suggestion;
use serde::Serialize;

pub mod doctor;
pub mod merge;
pub mod search;
pub mod stats;
pub mod suggest;
pub mod units;
pub mod update;
pub mod vcs;

#[cfg(test)]
pub(crate) mod fixtures;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// Statistics of one store or directory.
#[derive(Debug, Clone, Serialize)]
pub struct StatsLine {
    pub pootle_path: String,
    pub stats: QuickStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Counts>,
}

#[derive(Debug, Default, Serialize)]
pub struct CmdResult {
    pub stats: Vec<StatsLine>,
    pub units: Vec<UnitRow>,
    pub suggestions: Vec<Suggestion>,
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_stats(mut self, stats: Vec<StatsLine>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_units(mut self, units: Vec<UnitRow>) -> Self {
        self.units = units;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<Suggestion>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.hits = hits;
        self
    }

    pub fn with_merge(mut self, report: MergeReport) -> Self {
        self.merge = Some(report);
        self
    }
}

//! # Version Control Commands
//!
//! [`update`] pulls upstream changes into one store and folds the local
//! translations back in. When anything fails the working copy is put back, so
//! a broken update never loses local work. [`update_all`] does the same for
//! every store and keeps going past failures. [`commit`] syncs and commits a
//! store with a statistics line as its message.

use crate::commands::{CmdMessage, CmdResult, StatsLine};
use crate::error::Result;
use crate::project::TranslationProject;
use crate::projection::ProjectionBackend;
use crate::stats::stats_message;
use crate::vcs::VersionControl;

pub fn update<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    vcs: &dyn VersionControl,
) -> Result<CmdResult> {
    let report = project.update_from_version_control(store, vcs)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::info(format!(
        "Local: {}",
        stats_message(store, &report.old)
    )));
    result.add_message(CmdMessage::info(format!(
        "Upstream: {}",
        stats_message(store, &report.remote)
    )));
    result.add_message(CmdMessage::success(format!(
        "Merged: {}",
        stats_message(store, &report.merged)
    )));
    if report.merge.suggested > 0 {
        result.add_message(CmdMessage::warning(format!(
            "{} local translations conflicted and were kept as suggestions",
            report.merge.suggested
        )));
    }
    let line = StatsLine {
        pootle_path: store.to_string(),
        stats: report.merged,
        checks: None,
    };
    Ok(result.with_stats(vec![line]).with_merge(report.merge))
}

pub fn update_all<B: ProjectionBackend>(project: &TranslationProject<B>, vcs: &dyn VersionControl) -> Result<CmdResult> {
    let report = project.update_project(vcs)?;
    let mut result = CmdResult::default();
    let mut lines = Vec::new();
    for (path, updated) in report.updated {
        result.add_message(CmdMessage::success(stats_message(&path, &updated.merged)));
        lines.push(StatsLine {
            pootle_path: path,
            stats: updated.merged,
            checks: None,
        });
    }
    for (path, error) in report.failed {
        result.add_message(CmdMessage::error(format!("{}: {}", path, error)));
    }
    Ok(result.with_stats(lines))
}

pub fn commit<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    vcs: &dyn VersionControl,
    author: Option<&str>,
) -> Result<CmdResult> {
    let message = project.commit_file(store, vcs, author)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Committed {}", message)));
    Ok(result)
}

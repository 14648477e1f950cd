use crate::commands::{CmdMessage, CmdResult, StatsLine};
use crate::error::Result;
use crate::project::TranslationProject;
use crate::projection::ProjectionBackend;
use crate::stats::stats_message;

/// Statistics for `pootle_path`, followed by one line per store below it
/// when it names a directory.
pub fn run<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    pootle_path: &str,
    complete: bool,
) -> Result<CmdResult> {
    let mut lines = vec![line(project, pootle_path, complete)?];
    if pootle_path.ends_with('/') {
        for store in project.store_paths_under(pootle_path)? {
            lines.push(line(project, &store, complete)?);
        }
    }

    let mut result = CmdResult::default();
    let total = &lines[0];
    result.add_message(CmdMessage::info(stats_message(&total.pootle_path, &total.stats)));
    Ok(result.with_stats(lines))
}

fn line<B: ProjectionBackend>(project: &TranslationProject<B>, pootle_path: &str, complete: bool) -> Result<StatsLine> {
    let stats = project.quick_stats(pootle_path)?;
    let checks = if complete {
        Some(project.complete_stats(pootle_path)?)
    } else {
        None
    };
    Ok(StatsLine {
        pootle_path: pootle_path.to_string(),
        stats,
        checks,
    })
}

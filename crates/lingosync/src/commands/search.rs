use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::project::TranslationProject;
use crate::projection::ProjectionBackend;
use crate::search::SearchField;

/// Units under `pootle_path` containing every word of `query` in one of `fields`.
///
/// An empty field list searches all of them.
pub fn run<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    pootle_path: &str,
    query: &str,
    fields: &[SearchField],
) -> Result<CmdResult> {
    let fields = if fields.is_empty() { SearchField::ALL } else { fields };
    let hits = project.search(pootle_path, query, fields)?;

    let mut result = CmdResult::default();
    if hits.is_empty() {
        result.add_message(CmdMessage::info(format!("No units match '{}'.", query)));
    } else {
        result.add_message(CmdMessage::info(format!("{} units match '{}'.", hits.len(), query)));
    }
    Ok(result.with_hits(hits))
}

/// Rebuilds the search index of every store.
pub fn reindex<B: ProjectionBackend>(project: &TranslationProject<B>) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if !project.config().indexing_enabled {
        result.add_message(CmdMessage::warning("Indexing is disabled for this project."));
        return Ok(result);
    }
    let stores = project.update_index()?;
    result.add_message(CmdMessage::success(format!("Indexed {} stores.", stores)));
    Ok(result)
}

use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::project::TranslationProject;
use crate::projection::ProjectionBackend;

/// Live rows of a store in file order, optionally only the untranslated ones.
pub fn run<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    untranslated_only: bool,
) -> Result<CmdResult> {
    let rows: Vec<_> = project
        .with_store(store, |s, services| s.rows(services))?
        .into_iter()
        .filter(|r| !r.obsolete)
        .filter(|r| !untranslated_only || !r.is_translated())
        .collect();

    let mut result = CmdResult::default();
    if rows.is_empty() {
        result.add_message(CmdMessage::info("No units to show."));
    }
    Ok(result.with_units(rows))
}

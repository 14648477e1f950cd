//! # Doctor Command
//!
//! Brings the database back in line with the files on disk:
//!
//! - stores that appeared on disk are picked up
//! - rows of stores whose file is gone are dropped
//! - rows whose unit left the file are pruned
//!
//! Files are never modified. The database is derived from them, so it is the
//! side that gets repaired.

use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::project::TranslationProject;
use crate::projection::ProjectionBackend;

pub fn run<B: ProjectionBackend>(project: &TranslationProject<B>) -> Result<CmdResult> {
    let report = project.doctor()?;
    let mut result = CmdResult::default();

    if report.is_clean() {
        result.add_message(CmdMessage::success("No inconsistencies found."));
        return Ok(result);
    }

    result.add_message(CmdMessage::warning("Inconsistencies found and fixed:"));
    for path in &report.added_stores {
        result.add_message(CmdMessage::info(format!("  Picked up new file {}", path)));
    }
    for path in &report.dropped_stores {
        result.add_message(CmdMessage::info(format!("  Dropped rows of missing file {}", path)));
    }
    if report.pruned_rows > 0 {
        result.add_message(CmdMessage::info(format!(
            "  Pruned {} rows of units no longer in their file",
            report.pruned_rows
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{TestProject, FISH_PO, STORE};
    use std::fs;

    #[test]
    fn clean_project() {
        let env = TestProject::new();
        env.project.quick_stats(STORE).unwrap();
        let result = run(&env.project).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert!(result.messages[0].content.contains("No inconsistencies"));
    }

    #[test]
    fn prunes_rows_of_removed_units() {
        let env = TestProject::new();
        env.project.quick_stats(STORE).unwrap();

        let without_fish = FISH_PO.replace("#: fish.c:1\nmsgid \"fish\"\nmsgstr \"\"\n\n", "");
        fs::write(env.root.join("fish.po"), without_fish).unwrap();
        assert_eq!(env.project.quick_stats(STORE).unwrap().total, 2);

        let result = run(&env.project).unwrap();
        assert!(result.messages[0].content.contains("found and fixed"));
        assert!(result.messages.iter().any(|m| m.content.contains("Pruned 1 rows")));
        assert_eq!(env.project.services().projection.rows(STORE).unwrap().len(), 2);
    }

    #[test]
    fn drops_rows_of_missing_files() {
        let env = TestProject::new();
        let rows = env.project.with_store(STORE, |s, services| s.rows(services)).unwrap();
        let backend = env.project.services().projection.backend();
        backend.save_rows("/sw/demo/gone.po", &rows).unwrap();

        let result = run(&env.project).unwrap();
        assert!(result.messages.iter().any(|m| m.content.contains("/sw/demo/gone.po")));
        assert!(!backend.list_stores().unwrap().contains(&"/sw/demo/gone.po".to_string()));

        let again = run(&env.project).unwrap();
        assert!(again.messages[0].content.contains("No inconsistencies"));
    }

    #[test]
    fn picks_up_new_files() {
        let env = TestProject::new();
        fs::write(env.root.join("new.po"), FISH_PO).unwrap();
        let result = run(&env.project).unwrap();
        assert!(result.messages.iter().any(|m| m.content.contains("/sw/demo/new.po")));
    }
}

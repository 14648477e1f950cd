use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::project::TranslationProject;
use crate::projection::{ProjectionBackend, RowId, UnitUpdate};

/// Applies `update` to one unit and saves its file.
pub fn run<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    unit: RowId,
    update: &UnitUpdate,
    user: Option<&str>,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if update.is_empty() {
        result.add_message(CmdMessage::info("Nothing to update."));
        return Ok(result);
    }
    let (changed, row) = project.with_store(store, |s, services| {
        let changed = s.update_unit(services, unit, update, user)?;
        Ok((changed, s.get_unit(services, unit)?))
    })?;
    if changed {
        result.add_message(CmdMessage::success(format!("Unit {} updated.", unit)));
    } else {
        result.add_message(CmdMessage::info(format!("Unit {} already has these values.", unit)));
    }
    Ok(result.with_units(vec![row]))
}

/// Writes rows that differ from their files back to disk.
pub fn sync<B: ProjectionBackend>(project: &TranslationProject<B>, pootle_path: &str) -> Result<CmdResult> {
    let saved = project.sync_all(pootle_path)?;
    let mut result = CmdResult::default();
    if saved.is_empty() {
        result.add_message(CmdMessage::info("All files are up to date."));
    } else {
        for path in saved {
            result.add_message(CmdMessage::success(format!("Saved {}", path)));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{TestProject, PREFIX, STORE};
    use crate::format::{PoFormat, TranslationFormat};
    use crate::model::MultiString;

    fn row_id(env: &TestProject, source: &str) -> RowId {
        env.project
            .with_store(STORE, |s, services| s.rows(services))
            .unwrap()
            .into_iter()
            .find(|r| r.source().first() == source)
            .unwrap()
            .id
    }

    #[test]
    fn updating_a_unit_saves_the_file_and_stats() {
        let env = TestProject::new();
        let id = row_id(&env, "fish");

        let result = run(&env.project, STORE, id, &UnitUpdate::target("samaka"), Some("amina")).unwrap();
        assert!(result.messages[0].content.contains("updated"));
        assert_eq!(result.units[0].target().first(), "samaka");

        let stats = env.project.quick_stats(STORE).unwrap();
        assert_eq!(stats.translated, 2);
        assert_eq!(stats.untranslated, 1);

        let reparsed = PoFormat.parse(env.file("fish.po").as_bytes()).unwrap();
        let fish = reparsed.units.iter().find(|u| u.source.first() == "fish").unwrap();
        assert_eq!(fish.target.first(), "samaka");
        assert_eq!(reparsed.header().unwrap().get("Last-Translator"), Some("amina"));
    }

    #[test]
    fn plural_update_keeps_every_variant() {
        let env = TestProject::new();
        let id = row_id(&env, "%d fish");
        let update = UnitUpdate::target(MultiString::plural(["samaka", "samak"]));
        run(&env.project, STORE, id, &update, None).unwrap();

        let reparsed = PoFormat.parse(env.file("fish.po").as_bytes()).unwrap();
        let plural = reparsed.units.iter().find(|u| u.source.is_plural()).unwrap();
        assert_eq!(plural.target.variants(), &["samaka", "samak"]);
    }

    #[test]
    fn same_value_is_a_no_op() {
        let env = TestProject::new();
        let id = row_id(&env, "one fish");
        let before = env.file("fish.po");

        let result = run(&env.project, STORE, id, &UnitUpdate::target("samaka"), None).unwrap();
        assert!(result.messages[0].content.contains("already"));
        assert_eq!(env.file("fish.po"), before);
    }

    #[test]
    fn unknown_unit_is_an_error() {
        let env = TestProject::new();
        assert!(run(&env.project, STORE, RowId(999), &UnitUpdate::target("x"), None).is_err());
    }

    #[test]
    fn sync_with_nothing_pending() {
        let env = TestProject::new();
        let before = env.file("fish.po");
        let result = sync(&env.project, PREFIX).unwrap();
        assert!(result.messages[0].content.contains("up to date"));
        assert_eq!(env.file("fish.po"), before);
    }
}

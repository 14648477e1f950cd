//! # Suggestion Commands
//!
//! - [`add`]: propose a translation; duplicates are ignored without error
//! - [`list`]: pending suggestions of a unit
//! - [`delete`]: reject a suggestion
//! - [`accept`]: make a suggestion the translation
//!
//! Suggestions are addressed by position in [`list`] plus their target text,
//! so a list that went stale since it was shown still removes the intended
//! suggestion.

use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::MultiString;
use crate::project::TranslationProject;
use crate::projection::{ProjectionBackend, RowId};

pub fn add<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    unit: RowId,
    target: MultiString,
    author: Option<&str>,
) -> Result<CmdResult> {
    let added = project.with_store(store, |s, services| s.add_suggestion(services, unit, target, author))?;
    let mut result = CmdResult::default();
    if added {
        result.add_message(CmdMessage::success(format!("Suggestion added to unit {}.", unit)));
    } else {
        result.add_message(CmdMessage::info(format!(
            "Unit {} already has this translation or suggestion.",
            unit
        )));
    }
    Ok(result)
}

pub fn list<B: ProjectionBackend>(project: &TranslationProject<B>, store: &str, unit: RowId) -> Result<CmdResult> {
    let suggestions = project.with_store(store, |s, services| s.suggestions(services, unit))?;
    let mut result = CmdResult::default();
    if suggestions.is_empty() {
        result.add_message(CmdMessage::info(format!("Unit {} has no suggestions.", unit)));
    }
    Ok(result.with_suggestions(suggestions))
}

pub fn delete<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    unit: RowId,
    position: usize,
    expected: &MultiString,
) -> Result<CmdResult> {
    let removed = project.with_store(store, |s, services| s.delete_suggestion(services, unit, position, expected))?;
    let mut result = CmdResult::default();
    if removed {
        result.add_message(CmdMessage::success("Suggestion rejected."));
    } else {
        result.add_message(CmdMessage::warning("No matching suggestion, nothing removed."));
    }
    Ok(result)
}

pub fn accept<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    unit: RowId,
    position: usize,
    expected: &MultiString,
    user: Option<&str>,
) -> Result<CmdResult> {
    let row = project.with_store(store, |s, services| {
        s.accept_suggestion(services, unit, position, expected, user)?;
        s.get_unit(services, unit)
    })?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!("Suggestion accepted for unit {}.", unit)));
    Ok(result.with_units(vec![row]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{TestProject, STORE};
    use crate::store::side_path;

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
    fn suggestion_equal_to_target_is_a_no_op() {
        let env = TestProject::new();
        let id = row_id(&env, "one fish");
        let result = add(&env.project, STORE, id, "samaka".into(), Some("bakari")).unwrap();
        assert!(result.messages[0].content.contains("already"));
        assert!(!side_path(&env.root.join("fish.po"), ".pending").exists());
    }

    #[test]
    fn add_list_and_reject() {
        let env = TestProject::new();
        let id = row_id(&env, "fish");
        add(&env.project, STORE, id, "samaki".into(), Some("bakari")).unwrap();
        let again = add(&env.project, STORE, id, "samaki".into(), Some("zuri")).unwrap();
        assert!(again.messages[0].content.contains("already"));

        let listed = list(&env.project, STORE, id).unwrap();
        assert_eq!(listed.suggestions.len(), 1);
        assert_eq!(listed.suggestions[0].author.as_deref(), Some("bakari"));

        let result = delete(&env.project, STORE, id, 0, &"samaki".into()).unwrap();
        assert!(result.messages[0].content.contains("rejected"));
        assert!(list(&env.project, STORE, id).unwrap().suggestions.is_empty());
    }

    #[test]
    fn stale_position_falls_back_to_target() {
        let env = TestProject::new();
        let id = row_id(&env, "fish");
        add(&env.project, STORE, id, "samaki".into(), None).unwrap();
        add(&env.project, STORE, id, "samaki wa".into(), None).unwrap();

        delete(&env.project, STORE, id, 0, &"samaki wa".into()).unwrap();
        let left = list(&env.project, STORE, id).unwrap().suggestions;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].target.first(), "samaki");
    }

    #[test]
    fn unmatched_delete_warns() {
        let env = TestProject::new();
        let id = row_id(&env, "fish");
        let result = delete(&env.project, STORE, id, 0, &"nothing".into()).unwrap();
        assert!(result.messages[0].content.contains("nothing removed"));
    }

    #[test]
    fn accept_translates_the_unit() {
        let env = TestProject::new();
        let id = row_id(&env, "fish");
        add(&env.project, STORE, id, "samaki".into(), Some("bakari")).unwrap();

        let result = accept(&env.project, STORE, id, 0, &"samaki".into(), Some("amina")).unwrap();
        assert_eq!(result.units[0].target().first(), "samaki");
        assert!(list(&env.project, STORE, id).unwrap().suggestions.is_empty());
        assert!(env.file("fish.po").contains("msgstr \"samaki\""));
    }
}

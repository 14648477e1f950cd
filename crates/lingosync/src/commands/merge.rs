//! # Merge Command
//!
//! Folds an uploaded translation file into a store. The [`MergeMode`] decides
//! how much the upload is trusted:
//!
//! - `Overwrite`: translations replace the store's, new strings are added and
//!   strings missing from the upload become obsolete.
//! - `Translate`: translations fill empty units; changes to translated units
//!   become suggestions.
//! - `Suggest`: nothing is translated directly, every change is a suggestion.

use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::merge::{MergeOptions, MergeReport};
use crate::permission::Permission;
use crate::project::TranslationProject;
use crate::projection::ProjectionBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Overwrite,
    Translate,
    Suggest,
}

impl MergeMode {
    pub fn options(self, user: Option<&str>) -> MergeOptions {
        let mut options = match self {
            MergeMode::Overwrite => MergeOptions::overwrite(),
            MergeMode::Translate => MergeOptions {
                suggestions: true,
                ..Default::default()
            },
            MergeMode::Suggest => MergeOptions {
                no_translate: true,
                ..Default::default()
            },
        };
        if let Some(user) = user {
            options = options.with_username(user);
        }
        options
    }

    /// What the uploading user must be allowed to do.
    pub fn permission(self) -> Permission {
        match self {
            MergeMode::Overwrite => Permission::Overwrite,
            MergeMode::Translate => Permission::Translate,
            MergeMode::Suggest => Permission::Suggest,
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::Overwrite => "overwrite",
            MergeMode::Translate => "translate",
            MergeMode::Suggest => "suggest",
        };
        f.write_str(name)
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(MergeMode::Overwrite),
            "translate" => Ok(MergeMode::Translate),
            "suggest" => Ok(MergeMode::Suggest),
            other => Err(format!("unknown merge mode '{}'", other)),
        }
    }
}

pub fn run<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    upload: &Path,
    mode: MergeMode,
    user: Option<&str>,
) -> Result<CmdResult> {
    run_with_options(project, store, upload, &mode.options(user))
}

/// Like [`run`] with explicit options, e.g. to allow new strings on a translate upload.
pub fn run_with_options<B: ProjectionBackend>(
    project: &TranslationProject<B>,
    store: &str,
    upload: &Path,
    options: &MergeOptions,
) -> Result<CmdResult> {
    let report = project.with_store(store, |s, services| s.merge_file(services, upload, options))?;
    let mut result = CmdResult::default();
    for message in describe(&report) {
        result.add_message(message);
    }
    Ok(result.with_merge(report))
}

fn describe(report: &MergeReport) -> Vec<CmdMessage> {
    if !report.changed() {
        return vec![CmdMessage::info("Nothing changed.")];
    }
    let mut messages = Vec::new();
    if report.updated > 0 {
        messages.push(CmdMessage::success(format!("{} translations updated", report.updated)));
    }
    if report.added > 0 {
        messages.push(CmdMessage::success(format!("{} new units added", report.added)));
    }
    if report.suggested > 0 {
        messages.push(CmdMessage::info(format!("{} suggestions recorded", report.suggested)));
    }
    if report.obsoleted > 0 {
        messages.push(CmdMessage::info(format!("{} units obsoleted", report.obsoleted)));
    }
    if report.discarded > 0 {
        messages.push(CmdMessage::warning(format!(
            "{} new units ignored, uploads may not add strings",
            report.discarded
        )));
    }
    if report.header_updated && messages.is_empty() {
        messages.push(CmdMessage::info("Header updated."));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{TestProject, STORE};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const UPLOAD: &str = "msgid \"\"
msgstr \"\"
\"Content-Type: text/plain; charset=UTF-8\\n\"

msgid \"fish\"
msgstr \"samaki\"

msgid \"one fish\"
msgstr \"samaka moja\"

msgid \"%d fish\"
msgid_plural \"%d fishes\"
msgstr[0] \"\"
msgstr[1] \"\"

msgid \"two fish\"
msgstr \"samaki wawili\"
";

    fn upload() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.po");
        fs::write(&path, UPLOAD).unwrap();
        (dir, path)
    }

    fn unit_count(env: &TestProject) -> usize {
        env.project
            .with_store(STORE, |s, services| s.rows(services))
            .unwrap()
            .iter()
            .filter(|r| !r.obsolete)
            .count()
    }

    #[test]
    fn translate_upload_discards_new_units() {
        let env = TestProject::new();
        let (_upload_dir, path) = upload();
        let result = run(&env.project, STORE, &path, MergeMode::Translate, Some("bakari")).unwrap();
        let report = result.merge.unwrap();
        assert_eq!(report.discarded, 1);
        assert_eq!(report.added, 0);
        assert_eq!(unit_count(&env), 3);
    }

    #[test]
    fn allowing_new_strings_adds_the_unit() {
        let env = TestProject::new();
        let (_upload_dir, path) = upload();
        let options = MergeOptions {
            allow_new_strings: true,
            ..MergeMode::Translate.options(Some("bakari"))
        };
        let result = run_with_options(&env.project, STORE, &path, &options).unwrap();
        assert_eq!(result.merge.unwrap().added, 1);
        assert_eq!(unit_count(&env), 4);
        assert!(env.file("fish.po").contains("msgid \"two fish\""));
    }

    #[test]
    fn translate_upload_fills_empty_and_suggests_changes() {
        let env = TestProject::new();
        let (_upload_dir, path) = upload();
        let report = run(&env.project, STORE, &path, MergeMode::Translate, Some("bakari"))
            .unwrap()
            .merge
            .unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.suggested, 1);
        let po = env.file("fish.po");
        assert!(po.contains("msgstr \"samaki\""));
        assert!(po.contains("msgstr \"samaka\""));
    }

    #[test]
    fn overwrite_upload_replaces_translations() {
        let env = TestProject::new();
        let (_upload_dir, path) = upload();
        let report = run(&env.project, STORE, &path, MergeMode::Overwrite, None)
            .unwrap()
            .merge
            .unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.suggested, 0);
        assert!(env.file("fish.po").contains("msgstr \"samaka moja\""));
    }

    #[test]
    fn suggest_upload_translates_nothing() {
        let env = TestProject::new();
        let (_upload_dir, path) = upload();
        let before = env.project.quick_stats(STORE).unwrap();
        let report = run(&env.project, STORE, &path, MergeMode::Suggest, Some("bakari"))
            .unwrap()
            .merge
            .unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(report.suggested, 2);
        assert_eq!(env.project.quick_stats(STORE).unwrap().translated, before.translated);
    }

    #[test]
    fn unreadable_upload_leaves_store_alone() {
        let env = TestProject::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.po");
        fs::write(&path, "msgid \"unterminated").unwrap();
        let before = env.file("fish.po");
        assert!(run(&env.project, STORE, &path, MergeMode::Overwrite, None).is_err());
        assert_eq!(env.file("fish.po"), before);
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [MergeMode::Overwrite, MergeMode::Translate, MergeMode::Suggest] {
            assert_eq!(mode.to_string().parse::<MergeMode>().unwrap(), mode);
        }
        assert!("rewrite".parse::<MergeMode>().is_err());
    }
}

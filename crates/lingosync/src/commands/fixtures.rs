use crate::config::SyncConfig;
use crate::projection::MemBackend;
use crate::project::TranslationProject;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const PREFIX: &str = "/sw/demo/";
pub const STORE: &str = "/sw/demo/fish.po";

/// Three units: untranslated, translated, untranslated plural.
pub const FISH_PO: &str = "msgid \"\"
msgstr \"\"
\"Content-Type: text/plain; charset=UTF-8\\n\"
\"Language: sw\\n\"

#: fish.c:1
msgid \"fish\"
msgstr \"\"

#: fish.c:2
msgid \"one fish\"
msgstr \"samaka\"

#: fish.c:3
msgid \"%d fish\"
msgid_plural \"%d fishes\"
msgstr[0] \"\"
msgstr[1] \"\"
";

pub struct TestProject {
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub project: TranslationProject<MemBackend>,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_files(&[("fish.po", FISH_PO)])
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        for (name, content) in files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("failed to create dir");
            }
            fs::write(path, content).expect("failed to write fixture");
        }
        let project = TranslationProject::open(&root, PREFIX, SyncConfig::default(), MemBackend::new())
            .expect("failed to open project");
        Self {
            _temp_dir: temp_dir,
            root,
            project,
        }
    }

    pub fn file(&self, name: &str) -> String {
        fs::read_to_string(self.root.join(name)).expect("failed to read file")
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use lingosync::commands::merge::MergeMode;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Overwrite,
    Translate,
    Suggest,
}

impl From<ModeArg> for MergeMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Overwrite => MergeMode::Overwrite,
            ModeArg::Translate => MergeMode::Translate,
            ModeArg::Suggest => MergeMode::Suggest,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Source,
    Target,
    Notes,
    Locations,
}

#[derive(Parser, Debug)]
#[command(name = "lingosync", bin_name = "lingosync", version)]
#[command(about = "Keeps translation files, their database and search index in sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true, help_heading = "Options")]
    pub root: Option<PathBuf>,

    /// Pootle path of the project directory, e.g. /sw/demo/
    #[arg(long, global = true, help_heading = "Options")]
    pub prefix: Option<String>,

    /// Name recorded as translator and suggester
    #[arg(long, global = true, env = "LINGOSYNC_USER", help_heading = "Options")]
    pub user: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Text, help_heading = "Options")]
    pub output: OutputMode,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show statistics for a store or directory
    #[command(display_order = 1)]
    Stats {
        /// Store or directory (defaults to the whole project)
        path: Option<String>,

        /// Include quality check failures
        #[arg(long)]
        complete: bool,
    },

    /// List the units of a store
    #[command(alias = "ls", display_order = 2)]
    Units {
        store: String,

        /// Only units without a translation
        #[arg(long)]
        untranslated: bool,
    },

    /// Write pending database changes back to the files
    #[command(display_order = 3)]
    Sync {
        /// Store or directory (defaults to the whole project)
        path: Option<String>,
    },

    /// Change the translation, comment or fuzzy flag of a unit
    #[command(display_order = 4)]
    UpdateUnit {
        store: String,

        /// Row id (12) or file position (@3)
        unit: String,

        /// New translation; repeat once per plural form
        #[arg(long = "target", num_args = 1)]
        targets: Vec<String>,

        /// Translator comment
        #[arg(long)]
        comment: Option<String>,

        /// Mark as fuzzy
        #[arg(long, conflicts_with = "no_fuzzy")]
        fuzzy: bool,

        /// Clear the fuzzy flag
        #[arg(long)]
        no_fuzzy: bool,
    },

    /// Suggest a translation for a unit
    #[command(display_order = 5)]
    Suggest {
        store: String,

        /// Row id (12) or file position (@3)
        unit: String,

        /// Suggested translation; several values for plural forms
        #[arg(required = true, num_args = 1..)]
        target: Vec<String>,
    },

    /// List, accept or reject the suggestions of a unit
    #[command(display_order = 6)]
    Suggestions {
        store: String,

        /// Row id (12) or file position (@3)
        unit: String,

        /// Accept the suggestion at this position of the list
        #[arg(long, conflicts_with = "reject")]
        accept: Option<usize>,

        /// Reject the suggestion at this position of the list
        #[arg(long)]
        reject: Option<usize>,
    },

    /// Merge an uploaded file into a store
    #[command(display_order = 7)]
    Merge {
        store: String,

        /// The uploaded file
        file: PathBuf,

        /// How far the upload is trusted
        #[arg(long, value_enum, default_value_t = ModeArg::Translate)]
        mode: ModeArg,
    },

    /// Search unit text
    #[command(display_order = 8)]
    Search {
        query: String,

        /// Store or directory to search (defaults to the whole project)
        #[arg(long)]
        path: Option<String>,

        /// Restrict to these fields; repeatable
        #[arg(long = "field", value_enum)]
        fields: Vec<FieldArg>,
    },

    /// Rebuild the search index
    #[command(display_order = 9)]
    Reindex,

    /// Check and fix database inconsistencies
    #[command(display_order = 10)]
    Doctor,
}

//! # CLI Layer
//!
//! This module is **one possible UI client** for lingosync. It is the only
//! place that parses arguments, sets up logging, and writes to stdout.
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: shell arguments become a typed [`Commands`] via clap
//! 2. **Context Setup**: open the project and build a [`SyncApi`]
//! 3. **API Dispatch**: one `handle_*` per subcommand
//! 4. **Output**: hand the `CmdResult` to `render` and print it
//!
//! Business logic is not tested here; that is the command layer's job.

use super::render::render_result;
use super::setup::{Cli, Commands, FieldArg, OutputMode};
use anyhow::{bail, Context, Result};
use clap::Parser;
use lingosync::commands::CmdResult;
use lingosync::model::MultiString;
use lingosync::permission::AllowAll;
use lingosync::projection::{FsBackend, UnitUpdate};
use lingosync::search::SearchField;
use lingosync::{SyncApi, TranslationProject};
use std::path::Path;

const LOG_ENV: &str = "LINGOSYNC_LOG";

struct AppContext {
    api: SyncApi<FsBackend, AllowAll>,
    output: OutputMode,
}

impl AppContext {
    /// Pootle path for a CLI argument: absolute paths pass through, anything
    /// else is taken relative to the project.
    fn pootle_path(&self, arg: &str) -> String {
        resolve_pootle_path(self.api.project().pootle_path(), arg)
    }

    fn pootle_path_or_root(&self, arg: Option<&str>) -> String {
        match arg {
            Some(arg) => self.pootle_path(arg),
            None => self.api.project().pootle_path().to_string(),
        }
    }

    fn print(&self, result: &CmdResult) -> Result<()> {
        let text = render_result(result, self.output)?;
        print!("{}", text);
        if self.output == OutputMode::Json {
            println!();
        }
        Ok(())
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = init_context(&cli)?;

    let result = match cli.command {
        Commands::Stats { path, complete } => ctx.api.stats(&ctx.pootle_path_or_root(path.as_deref()), complete)?,
        Commands::Units { store, untranslated } => ctx.api.units(&ctx.pootle_path(&store), untranslated)?,
        Commands::Sync { path } => ctx.api.sync(&ctx.pootle_path_or_root(path.as_deref()))?,
        Commands::UpdateUnit {
            store,
            unit,
            targets,
            comment,
            fuzzy,
            no_fuzzy,
        } => handle_update_unit(&ctx, &store, &unit, targets, comment, fuzzy, no_fuzzy)?,
        Commands::Suggest { store, unit, target } => {
            ctx.api
                .add_suggestion(&ctx.pootle_path(&store), &unit, MultiString::from(target))?
        }
        Commands::Suggestions {
            store,
            unit,
            accept,
            reject,
        } => handle_suggestions(&ctx, &store, &unit, accept, reject)?,
        Commands::Merge { store, file, mode } => {
            if !file.is_file() {
                bail!("No such file: {}", file.display());
            }
            ctx.api.merge(&ctx.pootle_path(&store), &file, mode.into())?
        }
        Commands::Search { query, path, fields } => {
            let fields: Vec<SearchField> = fields.into_iter().map(search_field).collect();
            ctx.api
                .search(&ctx.pootle_path_or_root(path.as_deref()), &query, &fields)?
        }
        Commands::Reindex => ctx.api.reindex()?,
        Commands::Doctor => ctx.api.doctor()?,
    };

    ctx.print(&result)
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("lingosync=debug,lingosync_cli=debug,info")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("No project directory at {}", root.display()))?;
    let prefix = match &cli.prefix {
        Some(prefix) => prefix.clone(),
        None => default_prefix(&root),
    };
    tracing::debug!(root = %root.display(), %prefix, "opening project");

    let project = TranslationProject::open_dir(&root, &prefix)?;
    let principal = cli.user.clone().unwrap_or_else(local_user);
    Ok(AppContext {
        api: SyncApi::new(project, AllowAll, principal),
        output: cli.output,
    })
}

fn handle_update_unit(
    ctx: &AppContext,
    store: &str,
    unit: &str,
    targets: Vec<String>,
    comment: Option<String>,
    fuzzy: bool,
    no_fuzzy: bool,
) -> Result<CmdResult> {
    let update = UnitUpdate {
        target: (!targets.is_empty()).then(|| MultiString::from(targets)),
        translator_comment: comment,
        fuzzy: match (fuzzy, no_fuzzy) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
    };
    Ok(ctx.api.update_unit(&ctx.pootle_path(store), unit, &update)?)
}

/// Without `--accept` or `--reject` this lists. Both take a position from
/// that listing; the target found there guards against a list that changed
/// in between.
fn handle_suggestions(
    ctx: &AppContext,
    store: &str,
    unit: &str,
    accept: Option<usize>,
    reject: Option<usize>,
) -> Result<CmdResult> {
    let store = ctx.pootle_path(store);
    let listing = ctx.api.suggestions(&store, unit)?;
    let Some(position) = accept.or(reject) else {
        return Ok(listing);
    };
    let expected = listing
        .suggestions
        .iter()
        .find(|s| s.position == position)
        .map(|s| s.target.clone())
        .with_context(|| format!("Unit {} has no suggestion {}", unit, position))?;

    let result = if accept.is_some() {
        ctx.api.accept_suggestion(&store, unit, position, &expected)?
    } else {
        ctx.api.delete_suggestion(&store, unit, position, &expected)?
    };
    Ok(result)
}

fn search_field(field: FieldArg) -> SearchField {
    match field {
        FieldArg::Source => SearchField::Source,
        FieldArg::Target => SearchField::Target,
        FieldArg::Notes => SearchField::Notes,
        FieldArg::Locations => SearchField::Locations,
    }
}

fn resolve_pootle_path(project_path: &str, arg: &str) -> String {
    if arg.starts_with('/') {
        return arg.to_string();
    }
    let arg = arg.trim_start_matches("./");
    if arg.is_empty() || arg == "." {
        return project_path.to_string();
    }
    format!("{}{}", project_path, arg)
}

fn default_prefix(root: &Path) -> String {
    match root.file_name().and_then(|n| n.to_str()) {
        Some(name) => format!("/{}/", name),
        None => "/".to_string(),
    }
}

fn local_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "local".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_under_the_project() {
        assert_eq!(resolve_pootle_path("/sw/demo/", "fish.po"), "/sw/demo/fish.po");
        assert_eq!(resolve_pootle_path("/sw/demo/", "./sub/"), "/sw/demo/sub/");
        assert_eq!(resolve_pootle_path("/sw/demo/", "."), "/sw/demo/");
    }

    #[test]
    fn test_absolute_paths_pass_through() {
        assert_eq!(resolve_pootle_path("/sw/demo/", "/fr/demo/fish.po"), "/fr/demo/fish.po");
    }

    #[test]
    fn test_default_prefix_uses_directory_name() {
        assert_eq!(default_prefix(Path::new("/home/amina/demo")), "/demo/");
        assert_eq!(default_prefix(Path::new("/")), "/");
    }
}

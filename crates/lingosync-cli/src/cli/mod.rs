//! # CLI Behavior
//!
//! One client of the lingosync library. It works on the translation project in
//! the current directory (or `--root`), with the local user as principal and
//! every permission granted: whoever can run it can already edit the files.
//!
//! ## Addressing
//!
//! - Stores and directories can be given as pootle paths (`/sw/demo/fish.po`)
//!   or relative to the project (`fish.po`, `sub/`). The project's own pootle
//!   path comes from `--prefix`, by default `/<directory name>/`.
//! - Units are row ids (`12`) or file positions (`@3`).
//!
//! ## Output
//!
//! `--output text` (default) prints styled messages and tables; `--output json`
//! prints the whole `CmdResult` for scripting.
//!
//! ## Module Structure
//!
//! - `setup`: argument parsing via clap
//! - `commands`: context setup and dispatch to the API
//! - `render`: text and JSON rendering of results

mod commands;
mod render;
pub mod setup;

pub use commands::run;

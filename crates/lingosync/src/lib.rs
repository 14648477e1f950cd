//! # Lingosync Architecture
//!
//! Lingosync keeps three views of the same translation data consistent: the
//! files on disk, a database projection of their units, and a search index.
//! The file is always the source of truth. The projection and the index are
//! derived from it and can be rebuilt from it at any time.
//!
//! Like every module here, it is a **UI-agnostic library**. The `lingosync`
//! binary is just one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (lingosync-cli crate)                                  │
//! │  - Parses arguments, renders CmdResult, exit codes          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Permission checks, unit selectors → row ids              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - One module per operation, returns CmdResult              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Engine (project.rs, store.rs)                              │
//! │  - TranslationProject: tree, per-store locks, VCS workflows │
//! │  - Store: one file and everything derived from it           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Components                                                 │
//! │  file, units, projection, suggestions, stats, merge, search │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! Nothing from `api.rs` inward writes to stdout/stderr or exits the
//! process. Diagnostics go through `tracing`; results are Rust types.
//!
//! ## Testing Strategy
//!
//! 1. **Components**: unit tests next to the code, on `MemBackend` and temp dirs.
//! 2. **Commands**: the bulk of behavior tests, on a small fixture project.
//! 3. **API**: permission checks and selector resolution.
//! 4. **Integration** (`tests/`): end-to-end properties on the filesystem backend.
//!
//! ## Module Overview
//!
//! - [`api`]: the facade, entry point for all operations
//! - [`commands`]: one module per operation
//! - [`project`]: directory tree, store locks, version control workflows
//! - [`store`]: per-file orchestration of the components below
//! - [`file`]: file handles with staleness detection, LRU cache
//! - [`format`]: PO and JSON readers and writers
//! - [`units`]: parsed units with lazily built lookup indices
//! - [`projection`]: durable unit rows and their backends
//! - [`suggestions`]: pending translations, embedded or in a side file
//! - [`tm`]: translation memory side files
//! - [`stats`]: statistics, quality checks, the statistics cache
//! - [`merge`]: merging incoming files into a store
//! - [`search`]: per-store inverted index
//! - [`tree`]: directory and store hierarchy
//! - [`vcs`], [`permission`]: capabilities provided by the caller
//! - [`model`], [`config`], [`error`]: shared types

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod merge;
pub mod model;
pub mod permission;
pub mod project;
pub mod projection;
pub mod search;
pub mod stats;
pub mod store;
pub mod suggestions;
pub mod tm;
pub mod tree;
pub mod units;
pub mod vcs;

pub use api::{SyncApi, UnitSelector};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use project::TranslationProject;

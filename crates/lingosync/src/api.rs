//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the single
//! entry point for every lingosync operation, whatever the UI.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Authorizes** each mutation through the [`PermissionChecker`]
//! - **Normalizes inputs** (unit selectors become row ids)
//! - **Dispatches** to the matching `commands::*` function
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: that belongs in `commands/*.rs` and below
//! - **I/O to the terminal**: no stdout, stderr or formatting
//! - **Authentication**: the principal is given, never verified here
//!
//! ## Permissions
//!
//! Reads (statistics, unit listings, suggestion listings, search) need no
//! permission. Mutations are checked against the pootle path they touch:
//!
//! | Operation | Permission |
//! |-----------|------------|
//! | `update_unit`, `sync`, `reindex` | `Translate` |
//! | `add_suggestion` | `Suggest` |
//! | `delete_suggestion`, `accept_suggestion` | `Review` |
//! | `merge` | depends on [`MergeMode`] |
//! | `update_from_vcs`, `update_all`, `commit` | `Commit` |
//! | `doctor`, directory deletes, renames and moves | `Overwrite` |
//!
//! A denial is a [`SyncError::PermissionDenied`] and nothing is touched.
//!
//! ## Unit Selectors
//!
//! Units are addressed either by row id (`12`), which is stable across
//! edits, or by file position with an `@` prefix (`@3`), which is what a
//! user sees when reading the file. Positions are resolved to row ids
//! before dispatch.
//!
//! ## Generic Over Backend and Checker
//!
//! `SyncApi<B, P>` is generic over the projection backend and the permission
//! checker:
//! - Production: `SyncApi<FsBackend, AllowAll>` from the CLI
//! - Testing: `SyncApi<MemBackend, StaticPermissions>`

use crate::commands::{self, merge::MergeMode, CmdMessage, CmdResult};
use crate::error::{Result, SyncError};
use crate::model::MultiString;
use crate::permission::{Permission, PermissionChecker};
use crate::project::TranslationProject;
use crate::projection::{ProjectionBackend, RowId, UnitUpdate};
use crate::search::SearchField;
use crate::vcs::VersionControl;
use std::path::Path;
use std::str::FromStr;

/// How a caller names a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSelector {
    Id(RowId),
    /// Position in the file.
    Item(usize),
}

impl FromStr for UnitSelector {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || SyncError::InvalidSelector(s.to_string());
        match s.strip_prefix('@') {
            Some(pos) => pos.parse().map(UnitSelector::Item).map_err(|_| invalid()),
            None => s.parse().map(|id| UnitSelector::Id(RowId(id))).map_err(|_| invalid()),
        }
    }
}

pub struct SyncApi<B: ProjectionBackend, P: PermissionChecker> {
    project: TranslationProject<B>,
    permissions: P,
    principal: String,
}

impl<B: ProjectionBackend, P: PermissionChecker> SyncApi<B, P> {
    pub fn new(project: TranslationProject<B>, permissions: P, principal: impl Into<String>) -> Self {
        Self {
            project,
            permissions,
            principal: principal.into(),
        }
    }

    pub fn project(&self) -> &TranslationProject<B> {
        &self.project
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    fn authorize(&self, action: Permission, pootle_path: &str) -> Result<()> {
        if self.permissions.has_permission(&self.principal, action, pootle_path) {
            return Ok(());
        }
        Err(SyncError::PermissionDenied {
            principal: self.principal.clone(),
            action: action.to_string(),
            path: pootle_path.to_string(),
        })
    }

    fn resolve(&self, store: &str, selector: &str) -> Result<RowId> {
        match selector.parse::<UnitSelector>()? {
            UnitSelector::Id(id) => Ok(id),
            UnitSelector::Item(pos) => self
                .project
                .with_store(store, |s, services| s.get_item(services, pos))
                .map(|row| row.id),
        }
    }

    pub fn stats(&self, pootle_path: &str, complete: bool) -> Result<CmdResult> {
        commands::stats::run(&self.project, pootle_path, complete)
    }

    pub fn units(&self, store: &str, untranslated_only: bool) -> Result<CmdResult> {
        commands::units::run(&self.project, store, untranslated_only)
    }

    pub fn update_unit(&self, store: &str, selector: &str, update: &UnitUpdate) -> Result<CmdResult> {
        self.authorize(Permission::Translate, store)?;
        let id = self.resolve(store, selector)?;
        commands::update::run(&self.project, store, id, update, Some(&self.principal))
    }

    pub fn sync(&self, pootle_path: &str) -> Result<CmdResult> {
        self.authorize(Permission::Translate, pootle_path)?;
        commands::update::sync(&self.project, pootle_path)
    }

    pub fn suggestions(&self, store: &str, selector: &str) -> Result<CmdResult> {
        let id = self.resolve(store, selector)?;
        commands::suggest::list(&self.project, store, id)
    }

    pub fn add_suggestion(&self, store: &str, selector: &str, target: MultiString) -> Result<CmdResult> {
        self.authorize(Permission::Suggest, store)?;
        let id = self.resolve(store, selector)?;
        commands::suggest::add(&self.project, store, id, target, Some(&self.principal))
    }

    pub fn delete_suggestion(
        &self,
        store: &str,
        selector: &str,
        position: usize,
        expected: &MultiString,
    ) -> Result<CmdResult> {
        self.authorize(Permission::Review, store)?;
        let id = self.resolve(store, selector)?;
        commands::suggest::delete(&self.project, store, id, position, expected)
    }

    pub fn accept_suggestion(
        &self,
        store: &str,
        selector: &str,
        position: usize,
        expected: &MultiString,
    ) -> Result<CmdResult> {
        self.authorize(Permission::Review, store)?;
        let id = self.resolve(store, selector)?;
        commands::suggest::accept(&self.project, store, id, position, expected, Some(&self.principal))
    }

    pub fn merge(&self, store: &str, upload: &Path, mode: MergeMode) -> Result<CmdResult> {
        self.authorize(mode.permission(), store)?;
        commands::merge::run(&self.project, store, upload, mode, Some(&self.principal))
    }

    pub fn update_from_vcs(&self, store: &str, vcs: &dyn VersionControl) -> Result<CmdResult> {
        self.authorize(Permission::Commit, store)?;
        commands::vcs::update(&self.project, store, vcs)
    }

    pub fn update_all(&self, vcs: &dyn VersionControl) -> Result<CmdResult> {
        self.authorize(Permission::Commit, self.project.pootle_path())?;
        commands::vcs::update_all(&self.project, vcs)
    }

    pub fn commit(&self, store: &str, vcs: &dyn VersionControl) -> Result<CmdResult> {
        self.authorize(Permission::Commit, store)?;
        commands::vcs::commit(&self.project, store, vcs, Some(&self.principal))
    }

    pub fn search(&self, pootle_path: &str, query: &str, fields: &[SearchField]) -> Result<CmdResult> {
        commands::search::run(&self.project, pootle_path, query, fields)
    }

    pub fn reindex(&self) -> Result<CmdResult> {
        self.authorize(Permission::Translate, self.project.pootle_path())?;
        commands::search::reindex(&self.project)
    }

    pub fn doctor(&self) -> Result<CmdResult> {
        self.authorize(Permission::Overwrite, self.project.pootle_path())?;
        commands::doctor::run(&self.project)
    }

    pub fn delete_directory(&self, pootle_path: &str) -> Result<CmdResult> {
        self.authorize(Permission::Overwrite, pootle_path)?;
        let removed = self.project.delete_directory(pootle_path)?;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!(
            "Deleted {} with {} files.",
            pootle_path,
            removed.len()
        )));
        Ok(result)
    }

    pub fn rename_directory(&self, pootle_path: &str, new_name: &str) -> Result<CmdResult> {
        self.authorize(Permission::Overwrite, pootle_path)?;
        let renamed = self.project.rename_directory(pootle_path, new_name)?;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!("Renamed {} to {}", pootle_path, renamed)));
        Ok(result)
    }

    pub fn move_directory(&self, pootle_path: &str, new_parent: &str) -> Result<CmdResult> {
        self.authorize(Permission::Overwrite, pootle_path)?;
        self.authorize(Permission::Overwrite, new_parent)?;
        let moved = self.project.move_directory(pootle_path, new_parent)?;
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!("Moved {} to {}", pootle_path, moved)));
        Ok(result)
    }
}

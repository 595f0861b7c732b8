/*
 * aurum - AUR helper core for Arch Linux.
 * Copyright (C) 2025  the aurum contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Package-database capability.
//!
//! The resolution core only talks to the database through [`DbExecutor`];
//! the libalpm-backed implementation lives behind the `alpm` cargo feature
//! and tests use the mock executor.

#[cfg(feature = "alpm")]
pub mod alpm;
#[cfg(test)]
pub mod mock;
pub mod version;

use std::cmp::Ordering;

pub use version::vercmp;

/// Install reason recorded in the local package database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PkgReason {
    #[default]
    Explicit,
    Depend,
}

/// Plain package record as the resolution core sees it, whether it came
/// from the local database or a sync repository.
#[derive(Debug, Clone, Default)]
pub struct PkgInfo {
    pub name: String,
    pub base: String,
    pub version: String,
    /// "local" for installed packages, otherwise the sync repository name.
    pub db: String,
    pub depends: Vec<String>,
    pub conflicts: Vec<String>,
    pub provides: Vec<String>,
    pub groups: Vec<String>,
    pub reason: PkgReason,
    /// Unix epoch of the package build, used by the AUR time heuristic.
    pub build_date: i64,
}

/// One pending sync-repository upgrade.
#[derive(Debug, Clone)]
pub struct SyncUpgrade {
    pub package: PkgInfo,
    pub local_version: String,
    pub reason: PkgReason,
}

/// Read-only queries against the pacman databases.
///
/// Implementations must be cheap to call repeatedly; the resolvers issue
/// many small lookups during expansion. No transaction is ever opened.
pub trait DbExecutor: Send + Sync {
    /// Compare two version strings with the backend's own comparator.
    ///
    /// The default is the pure-Rust pacman ordering; the libalpm executor
    /// overrides it so planning decisions always agree with the package
    /// manager itself.
    fn vercmp(&self, a: &str, b: &str) -> Ordering {
        version::vercmp(a, b)
    }

    fn local_package(&self, name: &str) -> Option<PkgInfo>;

    fn local_packages(&self) -> Vec<PkgInfo>;

    /// Installed packages present in no sync repository (AUR/devel candidates).
    fn installed_remote_packages(&self) -> Vec<PkgInfo>;

    /// Does any installed package satisfy this dependency string?
    fn local_satisfier_exists(&self, dep: &str) -> bool;

    /// Exact-name lookup across all sync repositories.
    fn sync_package(&self, name: &str) -> Option<PkgInfo>;

    /// First sync package satisfying a dependency string (name or provides).
    fn sync_satisfier(&self, dep: &str) -> Option<PkgInfo>;

    /// Like [`DbExecutor::sync_satisfier`], restricted to one repository.
    fn satisfier_from_db(&self, dep: &str, db: &str) -> Option<PkgInfo>;

    fn packages_from_group(&self, group: &str) -> Vec<PkgInfo>;

    /// Diff installed versions against the sync repositories.
    fn sync_upgrades(&self, enable_downgrade: bool) -> Vec<SyncUpgrade>;
}

/// True when the installed version should be replaced by the candidate,
/// given the backend's comparison of the two.
pub fn upgrade_wanted(ordering: Ordering, enable_downgrade: bool) -> bool {
    match ordering {
        Ordering::Less => true,
        Ordering::Greater => enable_downgrade,
        Ordering::Equal => false,
    }
}

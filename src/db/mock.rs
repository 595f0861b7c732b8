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

//! Data-driven database double for resolver tests.

use super::{upgrade_wanted, DbExecutor, PkgInfo, SyncUpgrade};
use crate::dep::satisfies_pkg;

/// In-memory [`DbExecutor`] fed with plain package records.
#[derive(Default)]
pub struct MockDb {
    pub local: Vec<PkgInfo>,
    pub sync: Vec<PkgInfo>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, pkg: PkgInfo) -> Self {
        self.local.push(pkg);
        self
    }

    pub fn with_sync(mut self, pkg: PkgInfo) -> Self {
        self.sync.push(pkg);
        self
    }
}

impl DbExecutor for MockDb {
    fn local_package(&self, name: &str) -> Option<PkgInfo> {
        self.local.iter().find(|p| p.name == name).cloned()
    }

    fn local_packages(&self) -> Vec<PkgInfo> {
        self.local.clone()
    }

    fn installed_remote_packages(&self) -> Vec<PkgInfo> {
        self.local
            .iter()
            .filter(|p| self.sync.iter().all(|s| s.name != p.name))
            .cloned()
            .collect()
    }

    fn local_satisfier_exists(&self, dep: &str) -> bool {
        self.local.iter().any(|p| satisfies_pkg(dep, p))
    }

    fn sync_package(&self, name: &str) -> Option<PkgInfo> {
        self.sync.iter().find(|p| p.name == name).cloned()
    }

    fn sync_satisfier(&self, dep: &str) -> Option<PkgInfo> {
        self.sync.iter().find(|p| satisfies_pkg(dep, p)).cloned()
    }

    fn satisfier_from_db(&self, dep: &str, db: &str) -> Option<PkgInfo> {
        self.sync
            .iter()
            .find(|p| p.db == db && satisfies_pkg(dep, p))
            .cloned()
    }

    fn packages_from_group(&self, group: &str) -> Vec<PkgInfo> {
        self.sync
            .iter()
            .filter(|p| p.groups.iter().any(|g| g == group))
            .cloned()
            .collect()
    }

    fn sync_upgrades(&self, enable_downgrade: bool) -> Vec<SyncUpgrade> {
        self.local
            .iter()
            .filter_map(|local| {
                let candidate = self.sync_package(&local.name)?;
                let ordering = self.vercmp(&local.version, &candidate.version);
                upgrade_wanted(ordering, enable_downgrade).then(|| SyncUpgrade {
                    package: candidate,
                    local_version: local.version.clone(),
                    reason: local.reason,
                })
            })
            .collect()
    }
}

/// Shorthand for building package records in tests.
pub fn pkg(name: &str, version: &str, db: &str) -> PkgInfo {
    PkgInfo {
        name: name.to_string(),
        base: name.to_string(),
        version: version.to_string(),
        db: db.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfier_lookups() {
        let mut provider = pkg("electron28", "28.2.1-1", "extra");
        provider.provides = vec!["electron".into()];

        let db = MockDb::new()
            .with_local(pkg("glibc", "2.39-1", "local"))
            .with_sync(provider);

        assert!(db.local_satisfier_exists("glibc>=2.35"));
        assert!(!db.local_satisfier_exists("glibc>=3"));
        assert_eq!(db.sync_satisfier("electron").unwrap().name, "electron28");
        assert!(db.satisfier_from_db("electron", "core").is_none());
    }

    #[test]
    fn test_sync_upgrades_diff() {
        let db = MockDb::new()
            .with_local(pkg("vim", "9.0-1", "local"))
            .with_local(pkg("fresh", "1.0-1", "local"))
            .with_sync(pkg("vim", "9.1-1", "extra"))
            .with_sync(pkg("fresh", "1.0-1", "extra"));

        let ups = db.sync_upgrades(false);
        assert_eq!(ups.len(), 1);
        assert_eq!(ups[0].package.name, "vim");
        assert_eq!(ups[0].local_version, "9.0-1");
    }
}

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

//! libalpm-backed [`DbExecutor`].
//!
//! The handle is opened read-only against the system pacman databases; no
//! transaction is ever started here.

use alpm::{Alpm, Package, PackageReason, SigLevel};
use anyhow::{anyhow, Result};
use std::cmp::Ordering;

use super::{upgrade_wanted, DbExecutor, PkgInfo, PkgReason, SyncUpgrade};

pub struct AlpmExecutor {
    handle: Alpm,
}

impl AlpmExecutor {
    pub fn new() -> Result<Self> {
        let handle = Alpm::new("/", "/var/lib/pacman")
            .map_err(|e| anyhow!("failed to initialize libalpm: {}", e))?;

        for repo in ["core", "extra", "multilib"] {
            handle.register_syncdb(repo, SigLevel::DATABASE_OPTIONAL)?;
        }

        Ok(Self { handle })
    }

    fn convert(pkg: &Package, db: &str) -> PkgInfo {
        PkgInfo {
            name: pkg.name().to_string(),
            base: pkg.base().unwrap_or_else(|| pkg.name()).to_string(),
            version: pkg.version().to_string(),
            db: db.to_string(),
            depends: pkg.depends().iter().map(|d| d.to_string()).collect(),
            conflicts: pkg.conflicts().iter().map(|d| d.to_string()).collect(),
            provides: pkg.provides().iter().map(|d| d.to_string()).collect(),
            groups: pkg.groups().iter().map(str::to_string).collect(),
            reason: match pkg.reason() {
                PackageReason::Explicit => PkgReason::Explicit,
                PackageReason::Depend => PkgReason::Depend,
            },
            build_date: pkg.build_date(),
        }
    }
}

impl DbExecutor for AlpmExecutor {
    fn vercmp(&self, a: &str, b: &str) -> Ordering {
        alpm::vercmp(a, b)
    }

    fn local_package(&self, name: &str) -> Option<PkgInfo> {
        self.handle
            .localdb()
            .pkg(name)
            .ok()
            .map(|p| Self::convert(&p, "local"))
    }

    fn local_packages(&self) -> Vec<PkgInfo> {
        self.handle
            .localdb()
            .pkgs()
            .iter()
            .map(|p| Self::convert(&p, "local"))
            .collect()
    }

    fn installed_remote_packages(&self) -> Vec<PkgInfo> {
        self.handle
            .localdb()
            .pkgs()
            .iter()
            .filter(|p| {
                self.handle
                    .syncdbs()
                    .iter()
                    .all(|db| db.pkg(p.name()).is_err())
            })
            .map(|p| Self::convert(&p, "local"))
            .collect()
    }

    fn local_satisfier_exists(&self, dep: &str) -> bool {
        self.handle.localdb().pkgs().find_satisfier(dep).is_some()
    }

    fn sync_package(&self, name: &str) -> Option<PkgInfo> {
        self.handle
            .syncdbs()
            .iter()
            .find_map(|db| db.pkg(name).ok().map(|p| Self::convert(&p, db.name())))
    }

    fn sync_satisfier(&self, dep: &str) -> Option<PkgInfo> {
        self.handle.syncdbs().iter().find_map(|db| {
            db.pkgs()
                .find_satisfier(dep)
                .map(|p| Self::convert(&p, db.name()))
        })
    }

    fn satisfier_from_db(&self, dep: &str, db_name: &str) -> Option<PkgInfo> {
        self.handle
            .syncdbs()
            .iter()
            .filter(|db| db.name() == db_name)
            .find_map(|db| {
                db.pkgs()
                    .find_satisfier(dep)
                    .map(|p| Self::convert(&p, db.name()))
            })
    }

    fn packages_from_group(&self, group: &str) -> Vec<PkgInfo> {
        self.handle
            .syncdbs()
            .iter()
            .flat_map(|db| {
                db.group(group)
                    .map(|g| {
                        g.packages()
                            .iter()
                            .map(|p| Self::convert(&p, db.name()))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }

    fn sync_upgrades(&self, enable_downgrade: bool) -> Vec<SyncUpgrade> {
        self.handle
            .localdb()
            .pkgs()
            .iter()
            .filter_map(|local| {
                let candidate = self.sync_package(local.name())?;
                let ordering = self.vercmp(local.version().as_str(), &candidate.version);
                upgrade_wanted(ordering, enable_downgrade).then(|| SyncUpgrade {
                    package: candidate,
                    local_version: local.version().to_string(),
                    reason: match local.reason() {
                        PackageReason::Explicit => PkgReason::Explicit,
                        PackageReason::Depend => PkgReason::Depend,
                    },
                })
            })
            .collect()
    }
}

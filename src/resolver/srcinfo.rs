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

//! Resolution of local build directories.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::expand::DepExpander;
use super::SourceResolver;
use crate::dep::{DepGraph, InstallInfo, Reason, Source, Target};
use crate::error::AurumResult;
use crate::srcinfo::Srcinfo;

/// Claims targets that point at a directory holding a .SRCINFO.
///
/// Parsed packages are normalized into AUR records, so the dependency
/// expansion is shared with the AUR resolver.
pub struct SrcinfoResolver {
    expander: DepExpander,
    dirs: Vec<PathBuf>,
}

impl SrcinfoResolver {
    pub fn new(expander: DepExpander) -> Self {
        Self {
            expander,
            dirs: Vec::new(),
        }
    }

    fn srcinfo_dir(target: &Target) -> Option<PathBuf> {
        if target.db.is_some() || !target.modifier.is_empty() {
            return None;
        }

        let path = Path::new(&target.name);
        path.join(".SRCINFO").is_file().then(|| path.to_path_buf())
    }
}

#[async_trait]
impl SourceResolver for SrcinfoResolver {
    fn test(&mut self, target: &Target) -> bool {
        match Self::srcinfo_dir(target) {
            Some(dir) => {
                self.dirs.push(dir);
                true
            }
            None => false,
        }
    }

    async fn graph(&mut self, graph: &mut DepGraph) -> AurumResult<()> {
        for dir in std::mem::take(&mut self.dirs) {
            let srcinfo = match Srcinfo::read(&dir.join(".SRCINFO")) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("{}: {}", dir.display(), e);
                    continue;
                }
            };

            let dir_str = dir.display().to_string();
            for pkg in srcinfo.packages() {
                // split packages of one base build together; alias them so
                // dependency strings naming the base reach the member nodes
                if pkg.name != pkg.package_base && !graph.exists(&pkg.package_base) {
                    if let Err(e) = graph.add_alias(&pkg.name, &pkg.package_base) {
                        warn!("{} -> {}: {}", pkg.package_base, pkg.name, e);
                    }
                }

                let mut info = InstallInfo::new(Source::Srcinfo, Reason::Explicit, pkg.version.clone());
                info.aur_base = Some(pkg.package_base.clone());
                info.srcinfo_path = Some(dir_str.clone());

                self.expander.add_package(graph, &pkg, info).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aur::AurPackage;
    use crate::db::mock::{pkg, MockDb};
    use crate::resolver::testutil::FakeAur;
    use crate::resolver::ResolveOptions;
    use std::sync::Arc;

    const SRCINFO: &str = "\
pkgbase = aurum-git
	pkgver = 0.4.1.r3.gabc123
	pkgrel = 1
	makedepends = cargo
	depends = glibc

pkgname = aurum-git
	provides = aurum
";

    fn expander(db: MockDb, aur: Vec<AurPackage>) -> DepExpander {
        DepExpander::new(
            Arc::new(db),
            Arc::new(FakeAur::new(aur)),
            ResolveOptions {
                no_confirm: true,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_build_dir_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".SRCINFO"), SRCINFO).unwrap();

        let db = MockDb::new().with_sync(pkg("cargo", "1.80-1", "extra"));
        let mut resolver = SrcinfoResolver::new(expander(db, vec![]));

        let target = Target::parse(dir.path().to_str().unwrap());
        assert!(resolver.test(&target));

        let mut graph = DepGraph::new();
        resolver.graph(&mut graph).await.unwrap();

        let info = graph
            .get_node_info("aurum-git")
            .unwrap()
            .value
            .as_ref()
            .unwrap();
        assert_eq!(info.source, Source::Srcinfo);
        assert_eq!(info.version, "0.4.1.r3.gabc123-1");
        assert!(info.srcinfo_path.is_some());

        // glibc not installed, not in sync, not in AUR: missing node
        assert!(graph.exists("glibc"));
        assert!(graph.exists("cargo"));
        assert!(graph.provides_exists("aurum"));
    }

    #[tokio::test]
    async fn test_plain_name_not_claimed() {
        let db = MockDb::new();
        let mut resolver = SrcinfoResolver::new(expander(db, vec![]));
        assert!(!resolver.test(&Target::parse("jellyfin")));
    }
}

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

//! Sync-repository target resolution.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::SourceResolver;
use crate::db::{DbExecutor, PkgInfo};
use crate::dep::{
    node_info, split_dep, validate_and_set_node_info, DepGraph, InstallInfo, Reason, Source,
    Target,
};
use crate::error::AurumResult;

/// Claims targets found in the sync repositories or their package groups.
///
/// Dependency trees are not expanded here: sync packages install through
/// the package manager, which resolves them itself. A group target fans
/// out to its members without per-member expansion.
pub struct SyncResolver {
    db: Arc<dyn DbExecutor>,
    targets: Vec<Target>,
}

impl SyncResolver {
    pub fn new(db: Arc<dyn DbExecutor>) -> Self {
        Self {
            db,
            targets: Vec::new(),
        }
    }

    fn lookup(&self, target: &Target) -> Option<PkgInfo> {
        match &target.db {
            Some(db) => self.db.satisfier_from_db(&target.dep_string(), db),
            None => self.db.sync_satisfier(&target.dep_string()),
        }
    }

    fn add_sync_node(&self, graph: &mut DepGraph, pkg: &PkgInfo, reason: Reason) {
        graph.add_node(&pkg.name);

        let mut info = InstallInfo::new(Source::Sync, reason, pkg.version.clone());
        info.sync_db_name = Some(pkg.db.clone());
        validate_and_set_node_info(graph, &pkg.name, node_info(info));

        for provide in &pkg.provides {
            let (name, _, _) = split_dep(provide);
            graph.add_provider(name, provide, &pkg.name);
        }
    }
}

#[async_trait]
impl SourceResolver for SyncResolver {
    fn test(&mut self, target: &Target) -> bool {
        if target.db.as_deref() == Some("aur") {
            return false;
        }

        let claim = self.lookup(target).is_some()
            || (target.db.is_none() && !self.db.packages_from_group(&target.name).is_empty());

        if claim {
            self.targets.push(target.clone());
        }
        claim
    }

    async fn graph(&mut self, graph: &mut DepGraph) -> AurumResult<()> {
        for target in std::mem::take(&mut self.targets) {
            if let Some(pkg) = self.lookup(&target) {
                self.add_sync_node(graph, &pkg, Reason::Explicit);
                continue;
            }

            let members = self.db.packages_from_group(&target.name);
            if members.is_empty() {
                warn!("{}: no package found", target);
                continue;
            }

            // the group node itself is never built or installed
            graph.add_node(&target.name);
            let mut info = InstallInfo::new(Source::Sync, Reason::Explicit, String::new());
            info.sync_db_name = Some(members[0].db.clone());
            info.is_group = true;
            validate_and_set_node_info(graph, &target.name, node_info(info));

            for member in &members {
                self.add_sync_node(graph, member, Reason::Explicit);
                if let Err(e) = graph.depend_on(&member.name, &target.name) {
                    warn!("{} -> {}: {}", member.name, target.name, e);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{pkg, MockDb};

    fn db() -> MockDb {
        let mut vim = pkg("vim", "9.1-1", "extra");
        vim.groups = vec!["editors".into()];
        let mut emacs = pkg("emacs", "29.1-1", "extra");
        emacs.groups = vec!["editors".into()];

        MockDb::new().with_sync(vim).with_sync(emacs)
    }

    #[tokio::test]
    async fn test_sync_target() {
        let mut resolver = SyncResolver::new(Arc::new(db()));
        assert!(resolver.test(&Target::parse("extra/vim")));
        assert!(!resolver.test(&Target::parse("aur/vim")));
        assert!(!resolver.test(&Target::parse("core/vim")));

        let mut graph = DepGraph::new();
        resolver.graph(&mut graph).await.unwrap();

        let info = graph.get_node_info("vim").unwrap().value.as_ref().unwrap();
        assert_eq!(info.source, Source::Sync);
        assert_eq!(info.sync_db_name.as_deref(), Some("extra"));
        assert!(!info.is_group);
    }

    #[tokio::test]
    async fn test_group_target_fans_out() {
        let mut resolver = SyncResolver::new(Arc::new(db()));
        assert!(resolver.test(&Target::parse("editors")));

        let mut graph = DepGraph::new();
        resolver.graph(&mut graph).await.unwrap();

        let group = graph.get_node_info("editors").unwrap().value.as_ref().unwrap();
        assert!(group.is_group);

        let layers = graph.topo_sorted_layers();
        assert_eq!(layers[0], vec!["editors".to_string()]);
        assert_eq!(layers[1], vec!["vim".to_string(), "emacs".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_target_not_claimed() {
        let mut resolver = SyncResolver::new(Arc::new(db()));
        assert!(!resolver.test(&Target::parse("no-such-pkg")));
    }
}

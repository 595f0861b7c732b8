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

//! Dependency expansion shared by the AUR and SRCINFO resolvers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::warn;

use super::{provide_menu, ResolveOptions};
use crate::aur::{AurClient, AurPackage};
use crate::db::DbExecutor;
use crate::dep::{
    node_info, satisfies_aur, split_dep, validate_and_set_node_info, DepGraph, InstallInfo,
    Reason, Source,
};
use crate::graph::NodeInfo;

struct WorkItem {
    parent: String,
    dep: String,
    reason: Reason,
}

/// Walks dependency lists breadth-first, resolving each unmet dependency
/// against the graph, the local database, the sync repositories, and finally
/// the AUR. Unresolvable dependencies become `Missing` nodes instead of
/// aborting the pass.
///
/// A visited set keyed by dependency string bounds the walk: the same
/// spelling is resolved at most once per pass, no matter how many packages
/// declare it.
pub struct DepExpander {
    db: Arc<dyn DbExecutor>,
    aur: Arc<dyn AurClient>,
    opts: ResolveOptions,
    visited: HashSet<String>,
    provider_cache: HashMap<String, AurPackage>,
}

impl DepExpander {
    pub fn new(db: Arc<dyn DbExecutor>, aur: Arc<dyn AurClient>, opts: ResolveOptions) -> Self {
        Self {
            db,
            aur,
            opts,
            visited: HashSet::new(),
            provider_cache: HashMap::new(),
        }
    }

    pub fn options(&self) -> ResolveOptions {
        self.opts
    }

    /// Add one resolved package's node and expand its dependency lists.
    pub async fn add_package(
        &mut self,
        graph: &mut DepGraph,
        pkg: &AurPackage,
        info: InstallInfo,
    ) {
        graph.add_node(&pkg.name);
        validate_and_set_node_info(graph, &pkg.name, node_info(info));
        self.register_provides(graph, pkg);
        self.expand(graph, pkg).await;
    }

    /// Register the package's provides declarations so capability-named
    /// dependencies resolve to it regardless of discovery order.
    pub fn register_provides(&self, graph: &mut DepGraph, pkg: &AurPackage) {
        for provide in &pkg.provides {
            let (name, _, _) = split_dep(provide);
            if name != pkg.name {
                graph.add_provider(name, provide, &pkg.name);
            }
        }
    }

    /// Expand runtime, make, and check dependencies of a resolved package.
    pub async fn expand(&mut self, graph: &mut DepGraph, pkg: &AurPackage) {
        let mut queue = VecDeque::new();
        self.enqueue_lists(&mut queue, pkg);

        while let Some(item) = queue.pop_front() {
            self.resolve_one(graph, &mut queue, item).await;
        }
    }

    fn enqueue_lists(&self, queue: &mut VecDeque<WorkItem>, pkg: &AurPackage) {
        let mut push = |deps: &[String], reason: Reason| {
            for dep in deps {
                queue.push_back(WorkItem {
                    parent: pkg.name.clone(),
                    dep: dep.clone(),
                    reason,
                });
            }
        };

        if !self.opts.no_deps {
            push(&pkg.depends, Reason::Dep);
        }
        push(&pkg.make_depends, Reason::MakeDep);
        if !self.opts.no_check_deps {
            push(&pkg.check_depends, Reason::CheckDep);
        }
    }

    async fn resolve_one(
        &mut self,
        graph: &mut DepGraph,
        queue: &mut VecDeque<WorkItem>,
        item: WorkItem,
    ) {
        let (dep_name, dep_mod, dep_ver) = split_dep(&item.dep);
        let dep_name = dep_name.to_string();
        let missing_version = format!("{}{}", dep_mod, dep_ver);

        // already in the graph, directly or through a provider
        let existing = if graph.exists(&dep_name) {
            Some(dep_name.clone())
        } else {
            graph.provider_node(&dep_name).map(str::to_string)
        };
        if let Some(node) = existing {
            if let Err(e) = graph.depend_on(&node, &item.parent) {
                warn!("{} -> {}: {}", node, item.parent, e);
            }
            return;
        }

        // each dependency spelling is resolved once per pass
        if !self.visited.insert(item.dep.clone()) {
            return;
        }

        // an installed package satisfies it
        if self.db.local_satisfier_exists(&item.dep) {
            if self.opts.full_graph {
                validate_and_set_node_info(
                    graph,
                    &dep_name,
                    NodeInfo {
                        color: item.reason.color(),
                        background: Source::Local.bg_color(),
                        value: None,
                    },
                );
                if let Err(e) = graph.depend_on(&dep_name, &item.parent) {
                    warn!("{} -> {}: {}", dep_name, item.parent, e);
                }
            }
            return;
        }

        // a sync repository satisfies it
        if let Some(sync_pkg) = self.db.sync_satisfier(&item.dep) {
            if let Err(e) = graph.depend_on(&sync_pkg.name, &item.parent) {
                warn!("{} -> {}: {}", sync_pkg.name, item.parent, e);
            }

            let mut info = InstallInfo::new(Source::Sync, item.reason, sync_pkg.version.clone());
            info.sync_db_name = Some(sync_pkg.db.clone());
            validate_and_set_node_info(graph, &sync_pkg.name, node_info(info));

            for provide in &sync_pkg.provides {
                let (name, _, _) = split_dep(provide);
                graph.add_provider(name, provide, &sync_pkg.name);
            }

            if self.opts.full_graph {
                for dep in &sync_pkg.depends {
                    queue.push_back(WorkItem {
                        parent: sync_pkg.name.clone(),
                        dep: dep.clone(),
                        reason: Reason::Dep,
                    });
                }
            }
            return;
        }

        // the AUR satisfies it
        if let Some(aur_pkg) = self.lookup_aur(&dep_name, &item.dep).await {
            if let Err(e) = graph.depend_on(&aur_pkg.name, &item.parent) {
                warn!("{} -> {}: {}", aur_pkg.name, item.parent, e);
            }

            let mut info = InstallInfo::new(Source::Aur, item.reason, aur_pkg.version.clone());
            info.aur_base = Some(aur_pkg.package_base.clone());
            validate_and_set_node_info(graph, &aur_pkg.name, node_info(info));
            self.register_provides(graph, &aur_pkg);

            self.enqueue_lists(queue, &aur_pkg);
            return;
        }

        // nothing satisfies it; record the miss and keep going
        graph.add_node(&dep_name);
        let info = InstallInfo::new(Source::Missing, item.reason, missing_version);
        graph.set_node_info(&dep_name, node_info(info));
        if let Err(e) = graph.depend_on(&dep_name, &item.parent) {
            warn!("{} -> {}: {}", dep_name, item.parent, e);
        }
    }

    /// Exact-name query first, provider search on a miss.
    async fn lookup_aur(&mut self, dep_name: &str, dep_string: &str) -> Option<AurPackage> {
        if let Some(cached) = self.provider_cache.get(dep_name) {
            return Some(cached.clone());
        }

        let mut candidates = match self.aur.info(&[dep_name.to_string()]).await {
            Ok(pkgs) => pkgs,
            Err(e) => {
                warn!("AUR query failed for {}: {}", dep_name, e);
                Vec::new()
            }
        };

        if candidates.is_empty() {
            candidates = match self.aur.search_provides(dep_name).await {
                Ok(pkgs) => pkgs,
                Err(e) => {
                    warn!("AUR provider search failed for {}: {}", dep_name, e);
                    Vec::new()
                }
            };
        }

        candidates.retain(|p| satisfies_aur(dep_string, p));
        if candidates.is_empty() {
            return None;
        }

        let chosen = provide_menu(dep_name, &mut candidates, self.opts.no_confirm);
        self.provider_cache
            .insert(dep_name.to_string(), chosen.clone());

        Some(chosen)
    }
}

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

//! AUR target resolution.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{expand::DepExpander, provide_menu, ResolveOptions, SourceResolver};
use crate::aur::{AurClient, AurPackage};
use crate::db::{DbExecutor, PkgReason};
use crate::dep::{
    node_info, satisfies_aur, validate_and_set_node_info, DepGraph, InstallInfo, Reason, Source,
    Target,
};
use crate::error::AurumResult;

/// Resolves targets against the AUR and expands their dependency trees.
///
/// Registered last: it picks up every target the sync and SRCINFO
/// resolvers leave unclaimed.
pub struct AurResolver {
    db: Arc<dyn DbExecutor>,
    aur: Arc<dyn AurClient>,
    expander: DepExpander,
    opts: ResolveOptions,
    targets: Vec<Target>,
}

impl AurResolver {
    pub fn new(db: Arc<dyn DbExecutor>, aur: Arc<dyn AurClient>, opts: ResolveOptions) -> Self {
        Self {
            expander: DepExpander::new(db.clone(), aur.clone(), opts),
            db,
            aur,
            opts,
            targets: Vec::new(),
        }
    }

    /// The install reason an already-installed package recorded, so an
    /// upgrade does not turn a dependency into an explicit install.
    fn reason_for(&self, name: &str) -> Reason {
        match self.db.local_package(name) {
            Some(local) if local.reason == PkgReason::Depend => Reason::Dep,
            _ => Reason::Explicit,
        }
    }
}

#[async_trait]
impl SourceResolver for AurResolver {
    fn test(&mut self, target: &Target) -> bool {
        if target
            .db
            .as_deref()
            .map(|db| db != "aur")
            .unwrap_or(false)
        {
            return false;
        }

        self.targets.push(target.clone());
        true
    }

    async fn graph(&mut self, graph: &mut DepGraph) -> AurumResult<()> {
        let targets = std::mem::take(&mut self.targets);

        // one batched query covers every claimed target
        let names: Vec<String> = targets.iter().map(|t| t.name.clone()).collect();
        let mut by_name: HashMap<String, Vec<AurPackage>> = HashMap::new();
        if !names.is_empty() {
            match self.aur.info(&names).await {
                Ok(pkgs) => {
                    for pkg in pkgs {
                        by_name.entry(pkg.name.clone()).or_default().push(pkg);
                    }
                }
                Err(e) => warn!("AUR query failed: {}", e),
            }
        }

        for target in targets {
            let mut candidates = by_name.get(&target.name).cloned().unwrap_or_default();

            if candidates.is_empty() {
                match self.aur.search_provides(&target.name).await {
                    Ok(pkgs) => candidates = pkgs,
                    Err(e) => warn!("AUR provider search failed for {}: {}", target.name, e),
                }
            }

            candidates.retain(|p| satisfies_aur(&target.dep_string(), p));

            if candidates.is_empty() {
                warn!("{}: no package found", target);
                graph.add_node(&target.name);
                graph.set_node_info(
                    &target.name,
                    node_info(InstallInfo::new(
                        Source::Missing,
                        Reason::Explicit,
                        format!("{}{}", target.modifier, target.version),
                    )),
                );
                continue;
            }

            let pkg = provide_menu(&target.name, &mut candidates, self.opts.no_confirm);

            let local = self.db.local_package(&pkg.name);
            if self.opts.needed {
                if let Some(local) = &local {
                    if self.db.vercmp(&local.version, &pkg.version) != Ordering::Less {
                        info!("{}: {} is up to date -- skipping", pkg.name, local.version);
                        continue;
                    }
                }
            }

            // a target naming the pkgbase of a differently-named package
            // still reaches its node
            if pkg.name != target.name && pkg.package_base == target.name {
                if let Err(e) = graph.add_alias(&pkg.name, &target.name) {
                    warn!("{} -> {}: {}", target.name, pkg.name, e);
                }
            }

            let mut info = InstallInfo::new(Source::Aur, self.reason_for(&pkg.name), pkg.version.clone());
            info.aur_base = Some(pkg.package_base.clone());
            info.local_version = local.map(|l| l.version);

            self.expander.add_package(graph, &pkg, info).await;
        }

        Ok(())
    }
}

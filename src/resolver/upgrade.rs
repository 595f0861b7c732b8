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

//! System upgrade graphing: sync diff, AUR version compare, and devel
//! freshness probes.

use futures::stream::{FuturesUnordered, StreamExt};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::aur::AurClient;
use crate::db::{DbExecutor, PkgInfo, PkgReason};
use crate::dep::{node_info, validate_and_set_node_info, DepGraph, InstallInfo, Reason, Source};
use crate::error::AurumResult;
use crate::vcs::InfoStore;

/// What is displayed as the target version of a stale devel package.
const LATEST_COMMIT: &str = "latest-commit";

#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    /// Also pick sync packages whose repo version is older than installed.
    pub enable_downgrade: bool,
    /// Probe VCS packages for new upstream commits.
    pub devel: bool,
    /// Treat a newer AUR build timestamp as an upgrade even when the
    /// version string is unchanged.
    pub time_update: bool,
    /// Package names never considered.
    pub ignore: Vec<String>,
}

impl UpgradeOptions {
    fn ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|i| i == name)
    }
}

fn reason_of(reason: PkgReason) -> Reason {
    match reason {
        PkgReason::Explicit => Reason::Explicit,
        PkgReason::Depend => Reason::Dep,
    }
}

fn add_upgrade_node(graph: &mut DepGraph, name: &str, mut info: InstallInfo) {
    info.upgrade = true;
    graph.add_node(name);
    validate_and_set_node_info(graph, name, node_info(info));
}

/// Add an upgrade-tagged node for every installed package with a newer
/// candidate in its source family.
pub async fn graph_upgrades(
    graph: &mut DepGraph,
    db: &Arc<dyn DbExecutor>,
    aur: &Arc<dyn AurClient>,
    vcs: Option<&InfoStore>,
    opts: &UpgradeOptions,
) -> AurumResult<()> {
    for up in db.sync_upgrades(opts.enable_downgrade) {
        if opts.ignored(&up.package.name) {
            continue;
        }

        let mut info = InstallInfo::new(
            Source::Sync,
            reason_of(up.reason),
            up.package.version.clone(),
        );
        info.local_version = Some(up.local_version.clone());
        info.sync_db_name = Some(up.package.db.clone());
        add_upgrade_node(graph, &up.package.name, info);
    }

    let remote = db.installed_remote_packages();

    let devel_names = match vcs {
        Some(store) if opts.devel => stale_devel_packages(store, &remote, opts).await,
        _ => HashSet::new(),
    };

    for name in &devel_names {
        let local = remote.iter().find(|p| p.name == *name);
        let mut info = InstallInfo::new(
            Source::Aur,
            local.map(|l| reason_of(l.reason)).unwrap_or(Reason::Explicit),
            LATEST_COMMIT,
        );
        info.local_version = local.map(|l| l.version.clone());
        info.aur_base = local.map(|l| l.base.clone());
        add_upgrade_node(graph, name, info);
    }

    let names: Vec<String> = remote
        .iter()
        .filter(|p| !opts.ignored(&p.name) && !devel_names.contains(&p.name))
        .map(|p| p.name.clone())
        .collect();

    let aur_pkgs = match aur.info(&names).await {
        Ok(pkgs) => pkgs,
        Err(e) => {
            warn!("AUR upgrade query failed: {}", e);
            Vec::new()
        }
    };

    for aur_pkg in aur_pkgs {
        let Some(local) = remote.iter().find(|p| p.name == aur_pkg.name) else {
            continue;
        };

        let newer = db.vercmp(&local.version, &aur_pkg.version) == Ordering::Less;
        let rebuilt = opts.time_update && aur_pkg.last_modified as i64 > local.build_date;
        if !newer && !rebuilt {
            continue;
        }

        let mut info = InstallInfo::new(
            Source::Aur,
            reason_of(local.reason),
            aur_pkg.version.clone(),
        );
        info.local_version = Some(local.version.clone());
        info.aur_base = Some(aur_pkg.package_base.clone());
        add_upgrade_node(graph, &aur_pkg.name, info);
    }

    Ok(())
}

/// Probe every tracked devel package concurrently; collect the stale ones.
async fn stale_devel_packages(
    store: &InfoStore,
    remote: &[PkgInfo],
    opts: &UpgradeOptions,
) -> HashSet<String> {
    let tracked = store.tracked_packages().await;

    let mut probes: FuturesUnordered<_> = tracked
        .into_iter()
        .filter(|name| {
            !opts.ignored(name) && remote.iter().any(|p| p.name == *name)
        })
        .map(|name| async move {
            let stale = store.needs_update(&name).await;
            (name, stale)
        })
        .collect();

    let mut stale = HashSet::new();
    while let Some((name, needs)) = probes.next().await {
        if needs {
            stale.insert(name);
        }
    }

    stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{pkg, MockDb};
    use crate::db::SyncUpgrade;
    use crate::resolver::testutil::{aur_pkg, FakeAur};
    use crate::vcs::RevisionFetcher;

    /// Forwards every query to the wrapped db but inverts version
    /// comparison, standing in for a backend with its own ordering rules.
    struct FlippedDb(MockDb);

    impl DbExecutor for FlippedDb {
        fn vercmp(&self, a: &str, b: &str) -> Ordering {
            crate::db::vercmp(a, b).reverse()
        }

        fn local_package(&self, name: &str) -> Option<PkgInfo> {
            self.0.local_package(name)
        }
        fn local_packages(&self) -> Vec<PkgInfo> {
            self.0.local_packages()
        }
        fn installed_remote_packages(&self) -> Vec<PkgInfo> {
            self.0.installed_remote_packages()
        }
        fn local_satisfier_exists(&self, dep: &str) -> bool {
            self.0.local_satisfier_exists(dep)
        }
        fn sync_package(&self, name: &str) -> Option<PkgInfo> {
            self.0.sync_package(name)
        }
        fn sync_satisfier(&self, dep: &str) -> Option<PkgInfo> {
            self.0.sync_satisfier(dep)
        }
        fn satisfier_from_db(&self, dep: &str, db: &str) -> Option<PkgInfo> {
            self.0.satisfier_from_db(dep, db)
        }
        fn packages_from_group(&self, group: &str) -> Vec<PkgInfo> {
            self.0.packages_from_group(group)
        }
        fn sync_upgrades(&self, enable_downgrade: bool) -> Vec<SyncUpgrade> {
            self.0.sync_upgrades(enable_downgrade)
        }
    }

    struct FixedFetcher(String);

    #[async_trait::async_trait]
    impl RevisionFetcher for FixedFetcher {
        async fn head(&self, _url: &str, _branch: &str, _protocols: &[String]) -> Option<String> {
            Some(self.0.clone())
        }
    }

    fn upgrade_info<'a>(graph: &'a DepGraph, name: &str) -> &'a InstallInfo {
        graph.get_node_info(name).unwrap().value.as_ref().unwrap()
    }

    #[tokio::test]
    async fn test_sync_and_aur_upgrades() {
        let mut installed_dep = pkg("paru-helper", "1.0-1", "local");
        installed_dep.reason = PkgReason::Depend;

        let db: Arc<dyn DbExecutor> = Arc::new(
            MockDb::new()
                .with_local(pkg("vim", "9.0-1", "local"))
                .with_local(installed_dep)
                .with_sync(pkg("vim", "9.1-1", "extra")),
        );
        let aur: Arc<dyn AurClient> =
            Arc::new(FakeAur::new(vec![aur_pkg("paru-helper", "paru-helper", "1.1-1")]));

        let mut graph = DepGraph::new();
        graph_upgrades(&mut graph, &db, &aur, None, &UpgradeOptions::default())
            .await
            .unwrap();

        let vim = upgrade_info(&graph, "vim");
        assert!(vim.upgrade);
        assert_eq!(vim.source, Source::Sync);
        assert_eq!(vim.local_version.as_deref(), Some("9.0-1"));

        let helper = upgrade_info(&graph, "paru-helper");
        assert!(helper.upgrade);
        assert_eq!(helper.source, Source::Aur);
        // the recorded install reason survives the upgrade
        assert_eq!(helper.reason, Reason::Dep);
    }

    #[tokio::test]
    async fn test_ignored_packages_skipped() {
        let db: Arc<dyn DbExecutor> = Arc::new(
            MockDb::new()
                .with_local(pkg("vim", "9.0-1", "local"))
                .with_sync(pkg("vim", "9.1-1", "extra")),
        );
        let aur: Arc<dyn AurClient> = Arc::new(FakeAur::new(vec![]));

        let opts = UpgradeOptions {
            ignore: vec!["vim".to_string()],
            ..Default::default()
        };

        let mut graph = DepGraph::new();
        graph_upgrades(&mut graph, &db, &aur, None, &opts).await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn test_time_update_heuristic() {
        let mut local = pkg("snapshot-tool", "1.0-1", "local");
        local.build_date = 1_000;

        let db: Arc<dyn DbExecutor> = Arc::new(MockDb::new().with_local(local));

        let mut remote = aur_pkg("snapshot-tool", "snapshot-tool", "1.0-1");
        remote.last_modified = 2_000;
        let aur: Arc<dyn AurClient> = Arc::new(FakeAur::new(vec![remote]));

        let mut graph = DepGraph::new();
        graph_upgrades(&mut graph, &db, &aur, None, &UpgradeOptions::default())
            .await
            .unwrap();
        assert!(!graph.exists("snapshot-tool"));

        let opts = UpgradeOptions {
            time_update: true,
            ..Default::default()
        };
        graph_upgrades(&mut graph, &db, &aur, None, &opts).await.unwrap();
        assert!(upgrade_info(&graph, "snapshot-tool").upgrade);
    }

    #[tokio::test]
    async fn test_aur_stage_uses_executor_comparator() {
        // installed 2.0-1 against AUR 1.0-1: only the backend's own
        // comparator may decide this is an upgrade
        let db: Arc<dyn DbExecutor> = Arc::new(FlippedDb(
            MockDb::new().with_local(pkg("tool", "2.0-1", "local")),
        ));
        let aur: Arc<dyn AurClient> =
            Arc::new(FakeAur::new(vec![aur_pkg("tool", "tool", "1.0-1")]));

        let mut graph = DepGraph::new();
        graph_upgrades(&mut graph, &db, &aur, None, &UpgradeOptions::default())
            .await
            .unwrap();

        let info = upgrade_info(&graph, "tool");
        assert!(info.upgrade);
        assert_eq!(info.local_version.as_deref(), Some("2.0-1"));
    }

    #[tokio::test]
    async fn test_devel_upgrade_from_vcs_store() {
        let db: Arc<dyn DbExecutor> =
            Arc::new(MockDb::new().with_local(pkg("app-git", "r100.abc-1", "local")));
        let aur: Arc<dyn AurClient> =
            Arc::new(FakeAur::new(vec![aur_pkg("app-git", "app-git", "r100.abc-1")]));

        let dir = tempfile::tempdir().unwrap();
        let store = InfoStore::new(
            dir.path().join("vcs.json"),
            Arc::new(FixedFetcher("newsha".to_string())),
        );
        store.seed_record("app-git", "e.com/r.git", "oldsha");

        let opts = UpgradeOptions {
            devel: true,
            ..Default::default()
        };

        let mut graph = DepGraph::new();
        graph_upgrades(&mut graph, &db, &aur, Some(&store), &opts)
            .await
            .unwrap();

        let info = upgrade_info(&graph, "app-git");
        assert!(info.upgrade);
        assert_eq!(info.version, "latest-commit");
        assert_eq!(info.local_version.as_deref(), Some("r100.abc-1"));
    }
}

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

//! Conflict detection over the resolved candidate set.
//!
//! Three scans run as independent tasks with their own accumulators and
//! are merged only after all have joined:
//! - inner: two candidates conflict with each other,
//! - forward: a candidate conflicts with an installed package,
//! - reverse: an installed package declares a conflict with a candidate.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::aur::AurPackage;
use crate::db::{DbExecutor, PkgInfo};
use crate::dep::satisfies_pkg;
use crate::error::{AurumError, AurumResult};

type ConflictMap = HashMap<String, BTreeSet<String>>;

/// Conflict scan results. Non-empty means downstream policy has to decide
/// whether to proceed; the checker itself never escalates.
#[derive(Debug, Default)]
pub struct Conflicts {
    /// Candidate name -> conflicting installed package names. Inner
    /// conflict members appear as keys with empty sets: their resolution
    /// order is unknown at check time.
    pub conflicts: ConflictMap,
    /// Candidate name -> conflicting candidate names.
    pub inner: ConflictMap,
}

impl Conflicts {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty() && self.inner.is_empty()
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.inner.keys().collect();
        names.sort();
        for name in names {
            writeln!(
                f,
                "{} conflicts with {}",
                name,
                self.inner[name].iter().cloned().collect::<Vec<_>>().join(", ")
            )?;
        }

        let mut names: Vec<&String> = self
            .conflicts
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        for name in names {
            writeln!(
                f,
                "installing {} removes {}",
                name,
                self.conflicts[name].iter().cloned().collect::<Vec<_>>().join(", ")
            )?;
        }

        Ok(())
    }
}

/// A resolved AUR candidate in the shape the scans need.
pub fn candidate_from_aur(pkg: &AurPackage) -> PkgInfo {
    PkgInfo {
        name: pkg.name.clone(),
        base: pkg.package_base.clone(),
        version: pkg.version.clone(),
        db: "aur".to_string(),
        conflicts: pkg.conflicts.clone(),
        provides: pkg.provides.clone(),
        ..Default::default()
    }
}

pub struct ConflictChecker {
    db: Arc<dyn DbExecutor>,
}

impl ConflictChecker {
    pub fn new(db: Arc<dyn DbExecutor>) -> Self {
        Self { db }
    }

    /// Run all three scans concurrently and merge their results.
    pub async fn check(&self, candidates: Vec<PkgInfo>) -> AurumResult<Conflicts> {
        let candidates = Arc::new(candidates);

        // installed packages not being replaced by this operation
        let installed: Arc<Vec<PkgInfo>> = Arc::new(
            self.db
                .local_packages()
                .into_iter()
                .filter(|local| candidates.iter().all(|c| c.name != local.name))
                .collect(),
        );

        let inner_task = tokio::spawn(inner_conflicts(candidates.clone()));
        let forward_task = tokio::spawn(forward_conflicts(candidates.clone(), installed.clone()));
        let reverse_task = tokio::spawn(reverse_conflicts(candidates, installed));

        let (inner, forward, reverse) = tokio::try_join!(inner_task, forward_task, reverse_task)
            .map_err(|e| AurumError::Other(format!("conflict scan panicked: {}", e)))?;

        let mut conflicts = forward;
        for (name, set) in reverse {
            conflicts.entry(name).or_default().extend(set);
        }

        // both inner members become keys so the caller sees every package
        // whose installation needs a decision
        for (name, set) in &inner {
            conflicts.entry(name.clone()).or_default();
            for other in set {
                conflicts.entry(other.clone()).or_default();
            }
        }

        Ok(Conflicts { conflicts, inner })
    }
}

async fn inner_conflicts(candidates: Arc<Vec<PkgInfo>>) -> ConflictMap {
    let mut map = ConflictMap::new();

    for pkg in candidates.iter() {
        for conflict in &pkg.conflicts {
            for other in candidates.iter() {
                if other.name != pkg.name && satisfies_pkg(conflict, other) {
                    map.entry(pkg.name.clone())
                        .or_default()
                        .insert(other.name.clone());
                }
            }
        }
    }

    map
}

async fn forward_conflicts(
    candidates: Arc<Vec<PkgInfo>>,
    installed: Arc<Vec<PkgInfo>>,
) -> ConflictMap {
    let mut map = ConflictMap::new();

    for pkg in candidates.iter() {
        for conflict in &pkg.conflicts {
            for local in installed.iter() {
                if satisfies_pkg(conflict, local) {
                    map.entry(pkg.name.clone())
                        .or_default()
                        .insert(local.name.clone());
                }
            }
        }
    }

    map
}

async fn reverse_conflicts(
    candidates: Arc<Vec<PkgInfo>>,
    installed: Arc<Vec<PkgInfo>>,
) -> ConflictMap {
    let mut map = ConflictMap::new();

    for local in installed.iter() {
        for conflict in &local.conflicts {
            for pkg in candidates.iter() {
                if satisfies_pkg(conflict, pkg) {
                    map.entry(pkg.name.clone())
                        .or_default()
                        .insert(local.name.clone());
                }
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{pkg, MockDb};

    fn with_conflicts(mut p: PkgInfo, conflicts: &[&str]) -> PkgInfo {
        p.conflicts = conflicts.iter().map(|s| s.to_string()).collect();
        p
    }

    #[tokio::test]
    async fn test_forward_conflict_against_installed() {
        // candidate A conflicts with installed B
        let db = MockDb::new().with_local(pkg("pkg-b", "1.0-1", "local"));
        let checker = ConflictChecker::new(Arc::new(db));

        let candidate = with_conflicts(pkg("pkg-a", "2.0-1", "aur"), &["pkg-b"]);
        let result = checker.check(vec![candidate]).await.unwrap();

        assert!(!result.is_empty());
        assert!(result.conflicts["pkg-a"].contains("pkg-b"));
        assert!(result.inner.is_empty());
    }

    #[tokio::test]
    async fn test_reverse_conflict_from_installed() {
        let db = MockDb::new().with_local(with_conflicts(
            pkg("old-daemon", "1.0-1", "local"),
            &["new-daemon"],
        ));
        let checker = ConflictChecker::new(Arc::new(db));

        let result = checker
            .check(vec![pkg("new-daemon", "1.0-1", "aur")])
            .await
            .unwrap();

        assert!(result.conflicts["new-daemon"].contains("old-daemon"));
    }

    #[tokio::test]
    async fn test_inner_conflicts_become_empty_keys() {
        let checker = ConflictChecker::new(Arc::new(MockDb::new()));

        let a = with_conflicts(pkg("impl-a", "1.0-1", "aur"), &["impl-b"]);
        let b = pkg("impl-b", "1.0-1", "aur");
        let result = checker.check(vec![a, b]).await.unwrap();

        assert!(result.inner["impl-a"].contains("impl-b"));
        // both members are present with no forced removal recorded
        assert!(result.conflicts["impl-a"].is_empty());
        assert!(result.conflicts["impl-b"].is_empty());
    }

    #[tokio::test]
    async fn test_versioned_conflict_honors_range() {
        let db = MockDb::new().with_local(pkg("lib", "1.0-1", "local"));
        let checker = ConflictChecker::new(Arc::new(db));

        let narrow = with_conflicts(pkg("tool", "1.0-1", "aur"), &["lib<0.9"]);
        let result = checker.check(vec![narrow]).await.unwrap();
        assert!(result.is_empty());

        let wide = with_conflicts(pkg("tool", "1.0-1", "aur"), &["lib<2.0"]);
        let result = checker.check(vec![wide]).await.unwrap();
        assert!(result.conflicts["tool"].contains("lib"));
    }

    #[tokio::test]
    async fn test_replaced_package_not_a_conflict() {
        // a candidate replacing an installed version of itself is fine
        let db = MockDb::new().with_local(with_conflicts(
            pkg("tool", "1.0-1", "local"),
            &["other-tool"],
        ));
        let checker = ConflictChecker::new(Arc::new(db));

        let result = checker.check(vec![pkg("tool", "2.0-1", "aur")]).await.unwrap();
        assert!(result.is_empty());
    }
}

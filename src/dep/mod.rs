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

//! Dependency strings, install metadata, and build groups.

use std::cmp::Ordering;
use std::fmt;

use crate::aur::AurPackage;
use crate::db::{vercmp, PkgInfo};
use crate::graph::{Graph, NodeInfo};

pub type DepGraph = Graph<InstallInfo>;

/// Split `name[<|<=|=|>=|>]version` into its three parts.
///
/// A missing modifier or version comes back as the empty string, meaning
/// any version satisfies.
pub fn split_dep(dep: &str) -> (&str, &str, &str) {
    let start = match dep.find(|c| c == '<' || c == '>' || c == '=') {
        Some(i) => i,
        None => return (dep, "", ""),
    };

    let name = &dep[..start];
    let rest = &dep[start..];
    let ver_start = rest
        .find(|c| c != '<' && c != '>' && c != '=')
        .unwrap_or(rest.len());

    (name, &rest[..ver_start], &rest[ver_start..])
}

/// Does `ver1` stand in relation `modifier` to `ver2`?
pub fn ver_satisfies(ver1: &str, modifier: &str, ver2: &str) -> bool {
    match modifier {
        "=" => vercmp(ver1, ver2) == Ordering::Equal,
        "<" => vercmp(ver1, ver2) == Ordering::Less,
        "<=" => vercmp(ver1, ver2) != Ordering::Greater,
        ">" => vercmp(ver1, ver2) == Ordering::Greater,
        ">=" => vercmp(ver1, ver2) != Ordering::Less,
        _ => true,
    }
}

/// Does a package `name`/`version` satisfy the dependency string?
pub fn satisfies(name: &str, version: &str, dep: &str) -> bool {
    let (dep_name, dep_mod, dep_ver) = split_dep(dep);

    dep_name == name && ver_satisfies(version, dep_mod, dep_ver)
}

/// Does a provides declaration satisfy the dependency string?
///
/// A bare `provides=foo` still satisfies `foo>=1.0`: the provider's own
/// version stands in for the missing one, matching pacman behavior.
pub fn provide_satisfies(provide: &str, dep: &str, provider_version: &str) -> bool {
    let (dep_name, dep_mod, dep_ver) = split_dep(dep);
    let (prov_name, prov_mod, prov_ver) = split_dep(provide);

    if prov_name != dep_name {
        return false;
    }

    if prov_mod.is_empty() {
        return ver_satisfies(provider_version, dep_mod, dep_ver);
    }

    ver_satisfies(prov_ver, dep_mod, dep_ver)
}

/// Does an AUR package satisfy the dependency, by name or by provides?
pub fn satisfies_aur(dep: &str, pkg: &AurPackage) -> bool {
    if satisfies(&pkg.name, &pkg.version, dep) {
        return true;
    }

    pkg.provides
        .iter()
        .any(|p| provide_satisfies(p, dep, &pkg.version))
}

/// Like [`satisfies_aur`] for local/sync database records.
pub fn satisfies_pkg(dep: &str, pkg: &PkgInfo) -> bool {
    if satisfies(&pkg.name, &pkg.version, dep) {
        return true;
    }

    pkg.provides
        .iter()
        .any(|p| provide_satisfies(p, dep, &pkg.version))
}

/// One user-supplied target, parsed from `[db/]name[modifier version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub db: Option<String>,
    pub name: String,
    pub modifier: String,
    pub version: String,
}

impl Target {
    pub fn parse(s: &str) -> Self {
        // `repo/name` carries a db hint; anything path-like stays whole so
        // build-directory targets survive parsing
        let (db, rest) = match s.split_once('/') {
            Some((db, rest))
                if !db.is_empty()
                    && !rest.contains('/')
                    && db.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') =>
            {
                (Some(db.to_string()), rest)
            }
            _ => (None, s),
        };

        let (name, modifier, version) = split_dep(rest);

        Self {
            db,
            name: name.to_string(),
            modifier: modifier.to_string(),
            version: version.to_string(),
        }
    }

    /// The dependency string without the db prefix.
    pub fn dep_string(&self) -> String {
        format!("{}{}{}", self.name, self.modifier, self.version)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(db) = &self.db {
            write!(f, "{}/", db)?;
        }
        write!(f, "{}", self.dep_string())
    }
}

/// Why a node is in the graph. Ordinals matter: a lower value is more
/// specific and must never be overwritten by a higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reason {
    Explicit = 0,
    Dep = 1,
    MakeDep = 2,
    CheckDep = 3,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::Explicit => "Explicit",
            Reason::Dep => "Dependency",
            Reason::MakeDep => "Make Dependency",
            Reason::CheckDep => "Check Dependency",
        })
    }
}

impl Reason {
    /// Node outline color in the graphviz rendering.
    pub fn color(self) -> &'static str {
        match self {
            Reason::Explicit => "black",
            Reason::Dep => "deeppink",
            Reason::MakeDep => "navyblue",
            Reason::CheckDep => "forestgreen",
        }
    }
}

/// Where an install candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Aur,
    Sync,
    Local,
    Srcinfo,
    Missing,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Aur => "AUR",
            Source::Sync => "Sync",
            Source::Local => "Local",
            Source::Srcinfo => "SRCINFO",
            Source::Missing => "Missing",
        })
    }
}

impl Source {
    /// Node fill color in the graphviz rendering.
    pub fn bg_color(self) -> &'static str {
        match self {
            Source::Aur | Source::Srcinfo => "lightblue",
            Source::Sync => "lemonchiffon",
            Source::Local => "darkolivegreen1",
            Source::Missing => "tomato",
        }
    }
}

/// Everything the install planner needs to know about one graph node.
#[derive(Debug, Clone)]
pub struct InstallInfo {
    pub source: Source,
    pub reason: Reason,
    pub version: String,
    /// Version currently installed, when this node is an upgrade.
    pub local_version: Option<String>,
    pub upgrade: bool,
    pub aur_base: Option<String>,
    pub sync_db_name: Option<String>,
    pub srcinfo_path: Option<String>,
    /// Group targets fan out to members and are never built themselves.
    pub is_group: bool,
}

impl InstallInfo {
    pub fn new(source: Source, reason: Reason, version: impl Into<String>) -> Self {
        Self {
            source,
            reason,
            version: version.into(),
            local_version: None,
            upgrade: false,
            aur_base: None,
            sync_db_name: None,
            srcinfo_path: None,
            is_group: false,
        }
    }
}

impl fmt::Display for InstallInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstallInfo{{Source: {}, Reason: {}}}", self.source, self.reason)
    }
}

/// Build a display-colored node payload for [`set_node_info`].
pub fn node_info(info: InstallInfo) -> NodeInfo<InstallInfo> {
    NodeInfo {
        color: info.reason.color(),
        background: info.source.bg_color(),
        value: Some(info),
    }
}

/// Write node info unless it would lose information.
///
/// A node already marked as an upgrade, or holding a more specific reason
/// than the incoming write, keeps what it has.
pub fn validate_and_set_node_info(graph: &mut DepGraph, name: &str, info: NodeInfo<InstallInfo>) {
    if let Some(existing) = graph.get_node_info(name) {
        if let (Some(old), Some(new)) = (&existing.value, &info.value) {
            if old.upgrade || old.reason < new.reason {
                return;
            }
        }
    }

    graph.set_node_info(name, info);
}

/// Same-pkgbase AUR packages built together in one invocation.
#[derive(Debug, Clone)]
pub struct Base(pub Vec<AurPackage>);

impl Base {
    pub fn pkgbase(&self) -> &str {
        &self.0[0].package_base
    }

    pub fn version(&self) -> &str {
        &self.0[0].version
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.name.as_str())
    }
}

impl fmt::Display for Base {
    /// `pkgbase` when it builds a single same-named package, otherwise
    /// `pkgbase (member1 member2 ...)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 && self.0[0].name == self.pkgbase() {
            return write!(f, "{}-{}", self.pkgbase(), self.version());
        }

        write!(f, "{}-{} (", self.pkgbase(), self.version())?;
        for (i, name) in self.package_names().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        f.write_str(")")
    }
}

/// Group packages by pkgbase, preserving first-seen order.
pub fn get_bases(pkgs: Vec<AurPackage>) -> Vec<Base> {
    let mut bases: Vec<Base> = Vec::new();

    for pkg in pkgs {
        match bases.iter_mut().find(|b| b.pkgbase() == pkg.package_base) {
            Some(base) => base.0.push(pkg),
            None => bases.push(Base(vec![pkg])),
        }
    }

    bases
}

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

//! Dependency graph with alias and provides tables.
//!
//! Nodes are package names; the payload type carries whatever metadata the
//! caller attaches. Node iteration follows insertion order so topological
//! output is deterministic.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write as _};

use crate::error::GraphError;

/// Display metadata plus the caller's payload for one node.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo<V> {
    pub color: &'static str,
    pub background: &'static str,
    pub value: Option<V>,
}

/// One registered satisfier of a capability name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    pub provider: String,
    /// The provides declaration as written, e.g. `libfoo=1.2`.
    pub spec: String,
}

/// Directed dependency graph.
///
/// Edges run dependency -> dependent. An alias maps the names a pkgbase
/// produces onto the pkgbase node, so every spelling of a split package
/// lands on one node.
pub struct Graph<V> {
    order: Vec<String>,
    nodes: HashSet<String>,

    // alias -> canonical node, and the reverse
    alias: HashMap<String, String>,
    aliases: HashMap<String, Vec<String>>,

    node_info: HashMap<String, NodeInfo<V>>,

    // child -> parents it depends on
    dependencies: HashMap<String, HashSet<String>>,
    // parent -> children depending on it
    dependents: HashMap<String, HashSet<String>>,

    provides: HashMap<String, Vec<ProviderEntry>>,
}

impl<V> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Graph<V> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            nodes: HashSet::new(),
            alias: HashMap::new(),
            aliases: HashMap::new(),
            node_info: HashMap::new(),
            dependencies: HashMap::new(),
            dependents: HashMap::new(),
            provides: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn resolve<'a>(&'a self, node: &'a str) -> &'a str {
        self.alias.get(node).map(String::as_str).unwrap_or(node)
    }

    pub fn exists(&self, node: &str) -> bool {
        self.nodes.contains(self.resolve(node))
    }

    /// Idempotently add a node (through its alias, if any).
    pub fn add_node(&mut self, node: &str) {
        let node = self.resolve(node).to_string();
        if self.nodes.insert(node.clone()) {
            self.order.push(node);
        }
    }

    /// Register `alias` as a name produced by `node`.
    pub fn add_alias(&mut self, node: &str, alias: &str) -> Result<(), GraphError> {
        if node == alias {
            return Ok(());
        }

        self.add_node(node);

        if let Some(existing) = self.alias.get(alias) {
            if existing != node {
                return Err(GraphError::ConflictingAlias);
            }
            return Ok(());
        }

        self.alias.insert(alias.to_string(), node.to_string());
        self.aliases
            .entry(node.to_string())
            .or_default()
            .push(alias.to_string());

        Ok(())
    }

    /// Names aliased onto this node, in registration order.
    pub fn get_aliases(&self, node: &str) -> &[String] {
        self.aliases.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_node_info(&mut self, node: &str, info: NodeInfo<V>) {
        let node = self.resolve(node).to_string();
        self.node_info.insert(node, info);
    }

    pub fn get_node_info(&self, node: &str) -> Option<&NodeInfo<V>> {
        self.node_info.get(self.resolve(node))
    }

    /// Register `provider` as satisfying the capability `name`.
    pub fn add_provider(&mut self, name: &str, spec: &str, provider: &str) {
        let entry = ProviderEntry {
            provider: provider.to_string(),
            spec: spec.to_string(),
        };

        let entries = self.provides.entry(name.to_string()).or_default();
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }

    pub fn provides_exists(&self, name: &str) -> bool {
        self.provides.contains_key(name)
    }

    /// First registered provider of a capability that is a graph node.
    pub fn provider_node(&self, name: &str) -> Option<&str> {
        self.provides.get(name)?.iter().find_map(|e| {
            self.exists(&e.provider)
                .then(|| self.resolve(&e.provider))
        })
    }

    /// Record that `child` depends on `parent`.
    ///
    /// The graph is left untouched when the edge is self-referential or
    /// would close a cycle.
    pub fn depend_on(&mut self, child: &str, parent: &str) -> Result<(), GraphError> {
        let child = self.resolve(child).to_string();
        let parent = self.resolve(parent).to_string();

        if child == parent {
            return Err(GraphError::SelfReferential);
        }

        if self.depends_on(&parent, &child) {
            return Err(GraphError::Circular);
        }

        self.add_node(&parent);
        self.add_node(&child);

        self.dependents
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        self.dependencies.entry(child).or_default().insert(parent);

        Ok(())
    }

    /// Does `child` transitively depend on `parent`?
    pub fn depends_on(&self, child: &str, parent: &str) -> bool {
        self.transitive(child, &self.dependencies)
            .contains(self.resolve(parent))
    }

    pub fn has_dependent(&self, parent: &str, child: &str) -> bool {
        self.transitive(parent, &self.dependents)
            .contains(self.resolve(child))
    }

    fn transitive(&self, root: &str, next: &HashMap<String, HashSet<String>>) -> HashSet<String> {
        let root = self.resolve(root);
        let mut out = HashSet::new();

        if !self.nodes.contains(root) {
            return out;
        }

        let mut frontier = vec![root.to_string()];
        while let Some(node) = frontier.pop() {
            if let Some(nodes) = next.get(&node) {
                for n in nodes {
                    if out.insert(n.clone()) {
                        frontier.push(n.clone());
                    }
                }
            }
        }

        out
    }

    /// Nodes with no outstanding dependencies, in insertion order.
    pub fn leaves(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| !self.dependencies.contains_key(*n))
            .cloned()
            .collect()
    }

    /// Peel leaves off repeatedly; layer k only depends on layers before it.
    pub fn topo_sorted_layers(&self) -> Vec<Vec<String>> {
        let mut order = self.order.clone();
        let mut dependencies = self.dependencies.clone();
        let mut dependents = self.dependents.clone();
        let mut layers = Vec::new();

        loop {
            let leaves: Vec<String> = order
                .iter()
                .filter(|n| !dependencies.contains_key(*n))
                .cloned()
                .collect();

            if leaves.is_empty() {
                break;
            }

            for leaf in &leaves {
                if let Some(children) = dependents.remove(leaf) {
                    for child in children {
                        if let Some(parents) = dependencies.get_mut(&child) {
                            parents.remove(leaf);
                            if parents.is_empty() {
                                dependencies.remove(&child);
                            }
                        }
                    }
                }
                dependencies.remove(leaf);
            }

            order.retain(|n| !leaves.contains(n));
            layers.push(leaves);
        }

        layers
    }

    /// Flat topological order: every dependency precedes its dependents.
    pub fn topo_sorted(&self) -> Vec<String> {
        self.topo_sorted_layers().into_iter().flatten().collect()
    }
}

impl<V> fmt::Display for Graph<V> {
    /// Graphviz rendering for `--graph` output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("digraph {\ncompound=true;\nconcentrate=true;\n");
        out.push_str("node [shape = record, ordering=out];\n");

        for node in &self.order {
            let extra = match self.node_info.get(node) {
                Some(info) if !info.color.is_empty() || !info.background.is_empty() => {
                    format!(
                        "[color = {}, style = filled, fillcolor = {}]",
                        info.color, info.background
                    )
                }
                _ => String::new(),
            };
            writeln!(out, "\t\"{}\"{};", node, extra)?;
        }

        for child in &self.order {
            if let Some(parents) = self.dependencies.get(child) {
                let mut parents: Vec<&String> = parents.iter().collect();
                parents.sort();
                for parent in parents {
                    writeln!(out, "\t\"{}\" -> \"{}\";", child, parent)?;
                }
            }
        }

        out.push('}');
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph<()> {
        Graph::new()
    }

    // depend_on(dep, dependent): the dependent is peeled first, so layers
    // read top-down from the explicit target to its deepest dependencies.
    #[test]
    fn test_topo_order_emits_dependents_first() {
        let mut g = graph();
        g.depend_on("libfoo", "app").unwrap();
        g.depend_on("glibc", "libfoo").unwrap();
        g.depend_on("glibc", "app").unwrap();

        let sorted = g.topo_sorted();
        let pos = |n: &str| sorted.iter().position(|x| x == n).unwrap();
        assert!(pos("app") < pos("libfoo"));
        assert!(pos("libfoo") < pos("glibc"));
    }

    #[test]
    fn test_self_referential_edge_rejected() {
        let mut g = graph();
        g.add_node("a");

        assert_eq!(g.depend_on("a", "a"), Err(GraphError::SelfReferential));
        assert_eq!(g.len(), 1);
        assert!(g.leaves().contains(&"a".to_string()));
    }

    #[test]
    fn test_cycle_rejected_without_mutation() {
        let mut g = graph();
        g.depend_on("b", "a").unwrap();
        g.depend_on("c", "b").unwrap();

        assert_eq!(g.depend_on("a", "c"), Err(GraphError::Circular));
        // the failed call must not have added an edge
        assert!(!g.depends_on("a", "c"));
        assert_eq!(g.topo_sorted_layers().len(), 3);
        assert_eq!(g.topo_sorted(), ["a", "b", "c"]);
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let mut g = graph();
        g.add_alias("jellyfin", "jellyfin-server").unwrap();

        assert_eq!(
            g.add_alias("other-base", "jellyfin-server"),
            Err(GraphError::ConflictingAlias)
        );
        // the first alias stays authoritative
        g.add_node("jellyfin-server");
        assert!(g.exists("jellyfin"));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_alias_routes_edges_to_base() {
        let mut g = graph();
        g.add_alias("jellyfin", "jellyfin-web").unwrap();
        g.depend_on("jellyfin-web", "consumer").unwrap();

        assert!(g.depends_on("jellyfin", "consumer"));
        assert!(g.has_dependent("consumer", "jellyfin-web"));
        assert_eq!(g.get_aliases("jellyfin"), ["jellyfin-web".to_string()]);
    }

    #[test]
    fn test_layers_strip_leaves() {
        let mut g = graph();
        g.depend_on("liba", "app").unwrap();
        g.depend_on("libb", "app").unwrap();
        g.depend_on("glibc", "liba").unwrap();
        g.depend_on("glibc", "libb").unwrap();

        let layers = g.topo_sorted_layers();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["app".to_string()]);
        assert_eq!(layers[1], vec!["liba".to_string(), "libb".to_string()]);
        assert_eq!(layers[2], vec!["glibc".to_string()]);
    }

    #[test]
    fn test_leaves_follow_insertion_order() {
        let mut g = graph();
        g.add_node("zeta");
        g.add_node("alpha");
        g.add_node("mu");

        assert_eq!(g.leaves(), ["zeta", "alpha", "mu"]);
    }

    #[test]
    fn test_provider_lookup() {
        let mut g = graph();
        g.add_node("jellyfin-server");
        g.add_provider("jellyfin", "jellyfin=10.8.8", "jellyfin-server");
        g.add_provider("jellyfin", "jellyfin", "not-a-node");

        assert!(g.provides_exists("jellyfin"));
        assert_eq!(g.provider_node("jellyfin"), Some("jellyfin-server"));
        assert_eq!(g.provider_node("nothing"), None);
    }

    #[test]
    fn test_dot_rendering_lists_nodes() {
        let mut g = graph();
        g.depend_on("app", "lib").unwrap();

        let dot = g.to_string();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("\"app\" -> \"lib\";"));
    }
}

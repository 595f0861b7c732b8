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

//! Target routing and source resolvers.
//!
//! Each resolver claims the targets it can handle via [`SourceResolver::test`]
//! and later expands all of its claimed targets into the shared graph in one
//! [`SourceResolver::graph`] call.

pub mod aur;
pub mod expand;
pub mod srcinfo;
pub mod sync;
#[cfg(test)]
pub mod testutil;
pub mod upgrade;

use async_trait::async_trait;
use console::style;
use std::io::Write;
use tracing::warn;

use crate::aur::AurPackage;
use crate::dep::{DepGraph, Target};
use crate::error::AurumResult;

/// Flags steering one resolution pass. Passed explicitly; nothing here is
/// ever read from process-wide state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Materialize already-installed and sync dependencies as graph nodes.
    pub full_graph: bool,
    /// Skip runtime dependency expansion.
    pub no_deps: bool,
    /// Skip check dependency expansion.
    pub no_check_deps: bool,
    /// Answer every prompt with its default.
    pub no_confirm: bool,
    /// Skip targets whose installed version already matches.
    pub needed: bool,
}

/// One family of package sources.
#[async_trait]
pub trait SourceResolver: Send {
    /// Claim a target. Called once per user target, in registration order;
    /// the first resolver to claim it keeps it.
    fn test(&mut self, target: &Target) -> bool;

    /// Expand every claimed target into the shared graph.
    async fn graph(&mut self, graph: &mut DepGraph) -> AurumResult<()>;
}

/// Routes user targets to resolvers and runs them against one graph.
pub struct Grapher {
    resolvers: Vec<Box<dyn SourceResolver>>,
}

impl Grapher {
    pub fn new(resolvers: Vec<Box<dyn SourceResolver>>) -> Self {
        Self { resolvers }
    }

    /// Resolve all targets into a dependency graph.
    ///
    /// A target no resolver claims is reported and skipped; the remaining
    /// targets still resolve.
    pub async fn graph_from_targets(&mut self, targets: &[String]) -> AurumResult<DepGraph> {
        let mut graph = DepGraph::new();

        for raw in targets {
            let target = Target::parse(raw);
            if !self.resolvers.iter_mut().any(|r| r.test(&target)) {
                warn!("{}: no package found", target);
            }
        }

        for resolver in &mut self.resolvers {
            resolver.graph(&mut graph).await?;
        }

        Ok(graph)
    }
}

/// Pick one provider out of several AUR candidates.
///
/// The exact-name match sorts first, then alphabetical order; with prompts
/// disabled the first candidate wins.
pub fn provide_menu(dep: &str, options: &mut Vec<AurPackage>, no_confirm: bool) -> AurPackage {
    options.sort_by(|a, b| {
        if a.name == dep {
            std::cmp::Ordering::Less
        } else if b.name == dep {
            std::cmp::Ordering::Greater
        } else {
            a.name.cmp(&b.name)
        }
    });

    if options.len() == 1 || no_confirm {
        return options[0].clone();
    }

    println!(
        "{}",
        style(format!(
            "There are {} providers available for {}:",
            options.len(),
            dep
        ))
        .bold()
    );
    for (i, pkg) in options.iter().enumerate() {
        print!("{}) {} ", i + 1, pkg.name);
    }
    println!();

    loop {
        print!("\nEnter a number (default=1): ");
        let _ = std::io::stdout().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return options[0].clone();
        }

        let input = input.trim();
        if input.is_empty() {
            return options[0].clone();
        }

        match input.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => return options[n - 1].clone(),
            _ => eprintln!("{}", style(format!("invalid number: {}", input)).red()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str) -> AurPackage {
        AurPackage {
            name: name.into(),
            package_base: name.into(),
            version: "1.0-1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_provide_menu_prefers_exact_name() {
        let mut options = vec![
            candidate("electron28-bin"),
            candidate("electron"),
            candidate("electron28"),
        ];

        let chosen = provide_menu("electron", &mut options, true);
        assert_eq!(chosen.name, "electron");
    }

    #[test]
    fn test_provide_menu_falls_back_to_alphabetical() {
        let mut options = vec![candidate("zult"), candidate("abba")];

        let chosen = provide_menu("electron", &mut options, true);
        assert_eq!(chosen.name, "abba");
    }
}

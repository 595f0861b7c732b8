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

use anyhow::{anyhow, Result};
use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use console::style;
use std::io::Write;
use std::sync::Arc;

mod aur;
mod config;
mod conflicts;
mod db;
mod dep;
mod error;
mod graph;
mod logging;
mod resolver;
mod srcinfo;
mod vcs;

use crate::aur::{AurClient, AurPackage, RpcClient};
use crate::conflicts::{candidate_from_aur, ConflictChecker};
use crate::db::DbExecutor;
use crate::dep::{get_bases, DepGraph, Source};
use crate::resolver::aur::AurResolver;
use crate::resolver::expand::DepExpander;
use crate::resolver::srcinfo::SrcinfoResolver;
use crate::resolver::sync::SyncResolver;
use crate::resolver::upgrade::{graph_upgrades, UpgradeOptions};
use crate::resolver::{Grapher, ResolveOptions, SourceResolver};
use crate::vcs::{GitFetcher, InfoStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nCopyright (C) 2025  the aurum contributors\n",
    "License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>\n\n",
    "This is free software; you are free to change and redistribute it.\n",
    "There is NO WARRANTY, to the extent permitted by law."
);

#[derive(Parser)]
#[command(name = "aurum")]
#[command(version = VERSION)]
#[command(long_version = LONG_VERSION)]
#[command(about = "AUR helper core: dependency resolution and upgrade planning.")]
struct Cli {
    #[arg(short = 'S', long, help = "Resolve targets and plan installs/upgrades")]
    sync: bool,
    #[arg(short = 'u', long, help = "Upgrade installed packages (with -S)")]
    sysupgrade: bool,
    #[arg(long, help = "Probe VCS packages for new upstream commits")]
    devel: bool,
    #[arg(long, help = "Also graph installed and repo dependencies")]
    full_graph: bool,
    #[arg(long, help = "Skip runtime dependencies")]
    nodeps: bool,
    #[arg(long, help = "Skip check dependencies")]
    nocheckdeps: bool,
    #[arg(long, help = "Skip targets that are already up to date")]
    needed: bool,
    #[arg(long, help = "Bypass any confirmation prompts")]
    noconfirm: bool,
    #[arg(long, help = "Allow downgrades during sysupgrade")]
    downgrade: bool,
    #[arg(long, help = "Consider a newer AUR build of the same version an upgrade")]
    timeupdate: bool,
    #[arg(long, help = "Regenerate the VCS snapshot from local build directories")]
    gendb: bool,
    #[arg(long, help = "Print the dependency graph in graphviz format")]
    graph: bool,
    #[arg(long, value_name = "PKG", help = "Never consider these packages for upgrade")]
    ignore: Vec<String>,
    #[arg(value_name = "TARGETS")]
    targets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    PrintHelp,
    GenDb,
    Resolve,
}

/// Route the parsed flags to one operation, pacman-style: targets and
/// `--sysupgrade` are sub-options of `-S`.
fn operation(cli: &Cli) -> Result<Operation> {
    if cli.gendb {
        return Ok(Operation::GenDb);
    }
    if cli.sync {
        return Ok(Operation::Resolve);
    }
    if !cli.targets.is_empty() || cli.sysupgrade {
        return Err(anyhow!("no operation specified (use -S to install or upgrade)"));
    }
    Ok(Operation::PrintHelp)
}

#[cfg(feature = "alpm")]
fn open_db() -> Result<Arc<dyn DbExecutor>> {
    Ok(Arc::new(db::alpm::AlpmExecutor::new()?))
}

#[cfg(not(feature = "alpm"))]
fn open_db() -> Result<Arc<dyn DbExecutor>> {
    Err(anyhow!(
        "this build has no package database backend; rebuild with `--features alpm`"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let op = operation(&cli)?;
    if op == Operation::PrintHelp {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    }

    let config = config::Config::load();
    config.validate()?;
    console::set_colors_enabled(config.color);

    let db = open_db()?;
    let aur_client: Arc<dyn AurClient> = Arc::new(
        RpcClient::new(
            config.rpc_url.clone(),
            config.aur_cache_size,
            config.request_timeout_secs,
        )
        .with_snapshot(config.metadata_cache.clone()),
    );

    let git_bin = which::which(&config.git_bin)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| config.git_bin.clone());
    let fetcher = Arc::new(GitFetcher::new(git_bin, config.probe_timeout_secs));
    let store = InfoStore::load(config.vcs_file.clone(), fetcher);

    if op == Operation::GenDb {
        return gendb(&config, &db, &store).await;
    }

    let opts = ResolveOptions {
        full_graph: cli.full_graph,
        no_deps: cli.nodeps,
        no_check_deps: cli.nocheckdeps,
        no_confirm: cli.noconfirm,
        needed: cli.needed,
    };

    let resolvers: Vec<Box<dyn SourceResolver>> = vec![
        Box::new(SrcinfoResolver::new(DepExpander::new(
            db.clone(),
            aur_client.clone(),
            opts,
        ))),
        Box::new(SyncResolver::new(db.clone())),
        Box::new(AurResolver::new(db.clone(), aur_client.clone(), opts)),
    ];

    let mut grapher = Grapher::new(resolvers);
    let mut graph = grapher.graph_from_targets(&cli.targets).await?;

    if cli.sysupgrade {
        let upgrade_opts = UpgradeOptions {
            enable_downgrade: cli.downgrade,
            devel: cli.devel,
            time_update: cli.timeupdate,
            ignore: cli.ignore.clone(),
        };
        graph_upgrades(&mut graph, &db, &aur_client, Some(&store), &upgrade_opts).await?;

        if cli.devel {
            let installed: Vec<String> =
                db.local_packages().into_iter().map(|p| p.name).collect();
            store.clean_orphans(&installed).await?;
        }
    }

    if cli.graph {
        println!("{}", graph);
        return Ok(());
    }

    report_missing(&graph);

    let aur_names: Vec<String> = graph
        .topo_sorted()
        .into_iter()
        .filter(|name| {
            graph
                .get_node_info(name)
                .and_then(|n| n.value.as_ref())
                .is_some_and(|i| matches!(i.source, Source::Aur | Source::Srcinfo))
        })
        .collect();
    let aur_pkgs = aur_client.info(&aur_names).await.unwrap_or_default();

    check_conflicts(&graph, &db, &aur_pkgs, cli.noconfirm).await?;
    print_plan(&graph, &aur_pkgs);

    Ok(())
}

/// Rebuild the VCS snapshot from the .SRCINFO files of local build
/// directories, without building anything.
async fn gendb(
    config: &config::Config,
    db: &Arc<dyn DbExecutor>,
    store: &InfoStore,
) -> Result<()> {
    let entries = match std::fs::read_dir(&config.build_dir) {
        Ok(entries) => entries,
        Err(_) => {
            println!("nothing to do: no build directory at {}", config.build_dir.display());
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path().join(".SRCINFO");
        if !path.is_file() {
            continue;
        }

        let parsed = match srcinfo::Srcinfo::read(&path) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("{} {}", style("warning:").yellow().bold(), e);
                continue;
            }
        };

        let installed = parsed
            .packages()
            .iter()
            .any(|p| db.local_package(&p.name).is_some());
        if installed {
            store.update(parsed.pkgbase(), parsed.sources()).await?;
        }
    }

    println!("{} generated development package database", style("::").cyan().bold());
    Ok(())
}

/// Enumerate every unresolvable dependency chain in one report.
fn report_missing(graph: &DepGraph) {
    for name in graph.topo_sorted() {
        let Some(info) = graph.get_node_info(&name).and_then(|i| i.value.as_ref()) else {
            continue;
        };
        if info.source != Source::Missing {
            continue;
        }

        let wanted_by: Vec<String> = graph
            .topo_sorted()
            .into_iter()
            .filter(|other| graph.depends_on(&name, other))
            .collect();

        eprintln!(
            "{} could not find all required packages: {}{} (wanted by: {})",
            style("error:").red().bold(),
            name,
            info.version,
            wanted_by.join(" -> ")
        );
    }
}

async fn check_conflicts(
    graph: &DepGraph,
    db: &Arc<dyn DbExecutor>,
    aur_pkgs: &[AurPackage],
    no_confirm: bool,
) -> Result<()> {
    let mut candidates: Vec<_> = aur_pkgs.iter().map(candidate_from_aur).collect();

    for name in graph.topo_sorted() {
        let Some(info) = graph.get_node_info(&name).and_then(|i| i.value.as_ref()) else {
            continue;
        };
        if info.source == Source::Sync && !info.is_group {
            if let Some(pkg) = db.sync_package(&name) {
                candidates.push(pkg);
            }
        }
    }

    let conflicts = ConflictChecker::new(db.clone()).check(candidates).await?;
    if conflicts.is_empty() {
        return Ok(());
    }

    eprint!("{}", conflicts);
    if no_confirm {
        return Err(error::AurumError::UnresolvableConflicts.into());
    }

    print!("Conflicting packages will have to be confirmed manually. Continue? [y/N] ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    if !input.trim().eq_ignore_ascii_case("y") {
        return Err(anyhow!("aborted by user"));
    }

    Ok(())
}

/// Layered install plan, dependencies last, mirroring build order.
fn print_plan(graph: &DepGraph, aur_pkgs: &[AurPackage]) {
    if graph.is_empty() {
        println!(" there is nothing to do");
        return;
    }

    let bases = get_bases(aur_pkgs.to_vec());
    if !bases.is_empty() {
        let summary: Vec<String> = bases.iter().map(|b| b.to_string()).collect();
        println!(
            "{} AUR package bases to build: {}",
            style(bases.len()).cyan().bold(),
            summary.join("  ")
        );
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Layer", "Package", "Version", "Source", "Reason"]);

    for (i, layer) in graph.topo_sorted_layers().iter().enumerate() {
        for name in layer {
            let (version, source, reason) = match graph.get_node_info(name).and_then(|n| n.value.as_ref()) {
                Some(info) => {
                    let version = match (&info.local_version, info.upgrade) {
                        (Some(local), true) => format!("{} -> {}", local, info.version),
                        _ => info.version.clone(),
                    };
                    (version, info.source.to_string(), info.reason.to_string())
                }
                None => (String::new(), "Local".to_string(), String::new()),
            };

            table.add_row(vec![(i + 1).to_string(), name.clone(), version, source, reason]);
        }
    }

    println!("{table}");
}

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

//! Devel-package freshness tracking.
//!
//! For every installed VCS package the store remembers the last upstream
//! commit seen per source URL. Before an upgrade pass the recorded commits
//! are compared against the live upstream heads; any difference marks the
//! package stale.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AurumError, AurumResult};

/// Last known state of one upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub protocols: Vec<String>,
    pub branch: String,
    pub sha: String,
}

type PkgSources = HashMap<String, SourceInfo>;

/// Probes an upstream repository for the current head of a branch.
///
/// Returns `None` for any failure or timeout; an inconclusive probe must
/// never be treated as an answer.
#[async_trait::async_trait]
pub trait RevisionFetcher: Send + Sync {
    async fn head(&self, url: &str, branch: &str, protocols: &[String]) -> Option<String>;
}

/// `git ls-remote` with a hard timeout.
pub struct GitFetcher {
    git_bin: String,
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(git_bin: String, timeout_secs: u64) -> Self {
        Self {
            git_bin,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait::async_trait]
impl RevisionFetcher for GitFetcher {
    async fn head(&self, url: &str, branch: &str, protocols: &[String]) -> Option<String> {
        let protocol = protocols.last()?;

        let child = tokio::process::Command::new(&self.git_bin)
            .arg("ls-remote")
            .arg(format!("{}://{}", protocol, url))
            .arg(branch)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            // some remotes hang; killing on drop enforces the timeout
            .kill_on_drop(true)
            .spawn()
            .ok()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(_) => return None,
            Err(_) => {
                debug!("revision probe timed out for {}", url);
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.split_whitespace().next().map(str::to_string)
    }
}

/// Extract `(url, branch, protocols)` from a PKGBUILD source entry.
///
/// Only moving git sources qualify: a `#commit=` or `#tag=` fragment pins
/// the checkout, so the package is not tracked.
pub fn parse_source(source: &str) -> Option<(String, String, Vec<String>)> {
    let source = source.rsplit("::").next().unwrap_or(source);
    let (scheme, rest) = source.split_once("://")?;

    let protocols: Vec<&str> = scheme.splitn(2, '+').collect();
    if !protocols.contains(&"git") {
        return None;
    }
    let protocols = vec![protocols.last().unwrap().to_string()];

    let (url, branch) = match rest.split_once('#') {
        Some((url, fragment)) => {
            let (key, value) = fragment.split_once('=')?;
            if key != "branch" {
                return None;
            }
            (url, value)
        }
        None => (rest, "HEAD"),
    };

    let url = url.split('?').next().unwrap_or(url).to_string();
    let branch = branch.split('?').next().unwrap_or(branch).to_string();

    Some((url, branch, protocols))
}

/// Persistent map of devel package -> upstream source states.
///
/// The store is the only writer of its snapshot file; every save is an
/// atomic whole-file replacement.
pub struct InfoStore {
    path: PathBuf,
    fetcher: Arc<dyn RevisionFetcher>,
    data: Mutex<HashMap<String, PkgSources>>,
}

impl InfoStore {
    pub fn new(path: PathBuf, fetcher: Arc<dyn RevisionFetcher>) -> Self {
        Self {
            path,
            fetcher,
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Load the snapshot if one exists; a missing file is an empty store.
    pub fn load(path: PathBuf, fetcher: Arc<dyn RevisionFetcher>) -> Self {
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("ignoring unreadable vcs snapshot: {}", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            fetcher,
            data: Mutex::new(data),
        }
    }

    async fn save_locked(&self, data: &HashMap<String, PkgSources>) -> AurumResult<()> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| AurumError::Other(format!("failed to serialize vcs snapshot: {}", e)))?;

        let tmp = self.path.with_extension("json.new");
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        std::fs::write(&tmp, json).map_err(|e| AurumError::FileSystem {
            path: tmp.clone(),
            message: "failed to write vcs snapshot".to_string(),
            source: Some(e),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| AurumError::FileSystem {
            path: self.path.clone(),
            message: "failed to replace vcs snapshot".to_string(),
            source: Some(e),
        })?;

        Ok(())
    }

    /// Record the current upstream heads for a freshly built package.
    ///
    /// Sources are probed concurrently; every answered probe is merged and
    /// persisted as it completes, so an interrupted update keeps whatever
    /// it already learned.
    pub async fn update(&self, pkg_name: &str, sources: &[String]) -> AurumResult<()> {
        let mut probes: FuturesUnordered<_> = sources
            .iter()
            .filter_map(|s| parse_source(s))
            .map(|(url, branch, protocols)| {
                let fetcher = self.fetcher.clone();
                async move {
                    let sha = fetcher.head(&url, &branch, &protocols).await?;
                    Some((
                        url,
                        SourceInfo {
                            protocols,
                            branch,
                            sha,
                        },
                    ))
                }
            })
            .collect();

        while let Some(result) = probes.next().await {
            let Some((url, state)) = result else {
                continue;
            };
            info!("found git repo: {}", url);

            let mut data = self.data.lock().await;
            data.entry(pkg_name.to_string()).or_default().insert(url, state);
            self.save_locked(&data).await?;
        }

        Ok(())
    }

    /// Is any upstream source ahead of the recorded commit?
    ///
    /// Probes run concurrently and the first reported difference wins;
    /// outstanding probes are abandoned. Only when every probe reports
    /// unchanged or fails does the package count as fresh.
    pub async fn needs_update(&self, pkg_name: &str) -> bool {
        let sources = {
            let data = self.data.lock().await;
            match data.get(pkg_name) {
                Some(sources) => sources.clone(),
                None => return false,
            }
        };

        let mut probes: FuturesUnordered<_> = sources
            .into_iter()
            .map(|(url, info)| {
                let fetcher = self.fetcher.clone();
                async move {
                    match fetcher.head(&url, &info.branch, &info.protocols).await {
                        Some(head) => head != info.sha,
                        None => false,
                    }
                }
            })
            .collect();

        while let Some(changed) = probes.next().await {
            if changed {
                return true;
            }
        }

        false
    }

    /// Tracked package names, for the devel upgrade pass.
    pub async fn tracked_packages(&self) -> Vec<String> {
        self.data.lock().await.keys().cloned().collect()
    }

    /// Drop records for packages that are no longer installed.
    pub async fn clean_orphans(&self, installed: &[String]) -> AurumResult<()> {
        let mut data = self.data.lock().await;
        let before = data.len();
        data.retain(|name, _| installed.iter().any(|i| i == name));

        if data.len() != before {
            self.save_locked(&data).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn seed_record(&self, pkg: &str, url: &str, sha: &str) {
        let mut data = self.data.try_lock().unwrap();
        data.entry(pkg.to_string()).or_default().insert(
            url.to_string(),
            SourceInfo {
                protocols: vec!["https".to_string()],
                branch: "HEAD".to_string(),
                sha: sha.to_string(),
            },
        );
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(
            parse_source("git+https://github.com/jellyfin/jellyfin.git"),
            Some((
                "github.com/jellyfin/jellyfin.git".to_string(),
                "HEAD".to_string(),
                vec!["https".to_string()]
            ))
        );

        assert_eq!(
            parse_source("pkg::git://example.com/repo.git#branch=dev"),
            Some((
                "example.com/repo.git".to_string(),
                "dev".to_string(),
                vec!["git".to_string()]
            ))
        );

        // pinned checkouts are not moving targets
        assert_eq!(parse_source("git+https://e.com/r.git#commit=abc123"), None);
        assert_eq!(parse_source("git+https://e.com/r.git#tag=v1.0"), None);

        // not git at all
        assert_eq!(parse_source("https://example.com/tarball.tar.gz"), None);
        assert_eq!(parse_source("local-file.patch"), None);

        // query strings are stripped
        assert_eq!(
            parse_source("git+https://e.com/r.git?signed#branch=main"),
            Some((
                "e.com/r.git".to_string(),
                "main".to_string(),
                vec!["https".to_string()]
            ))
        );
    }

    /// Scripted fetcher: `None` entries never resolve.
    struct ScriptedFetcher {
        heads: HashMap<String, Option<String>>,
    }

    #[async_trait::async_trait]
    impl RevisionFetcher for ScriptedFetcher {
        async fn head(&self, url: &str, _branch: &str, _protocols: &[String]) -> Option<String> {
            match self.heads.get(url) {
                Some(Some(sha)) => Some(sha.clone()),
                Some(None) => futures::future::pending().await,
                None => None,
            }
        }
    }

    fn store_with(
        dir: &tempfile::TempDir,
        heads: Vec<(&str, Option<&str>)>,
        records: Vec<(&str, Vec<(&str, &str)>)>,
    ) -> InfoStore {
        let fetcher = ScriptedFetcher {
            heads: heads
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        };

        let store = InfoStore::new(dir.path().join("vcs.json"), Arc::new(fetcher));
        {
            let mut data = store.data.try_lock().unwrap();
            for (pkg, sources) in records {
                let sources = sources
                    .into_iter()
                    .map(|(url, sha)| {
                        (
                            url.to_string(),
                            SourceInfo {
                                protocols: vec!["https".to_string()],
                                branch: "HEAD".to_string(),
                                sha: sha.to_string(),
                            },
                        )
                    })
                    .collect();
                data.insert(pkg.to_string(), sources);
            }
        }
        store
    }

    #[tokio::test]
    async fn test_needs_update_short_circuits_on_first_difference() {
        let dir = tempfile::tempdir().unwrap();
        // one probe hangs forever, the other answers with a new commit
        let store = store_with(
            &dir,
            vec![("stuck.example/r.git", None), ("fast.example/r.git", Some("newsha"))],
            vec![(
                "app-git",
                vec![("stuck.example/r.git", "oldsha"), ("fast.example/r.git", "oldsha")],
            )],
        );

        let verdict = tokio::time::timeout(Duration::from_secs(1), store.needs_update("app-git"))
            .await
            .expect("must not wait for the hung probe");
        assert!(verdict);
    }

    #[tokio::test]
    async fn test_unchanged_and_failed_probes_mean_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            &dir,
            vec![("same.example/r.git", Some("abc"))],
            vec![(
                "app-git",
                vec![("same.example/r.git", "abc"), ("gone.example/r.git", "abc")],
            )],
        );

        assert!(!store.needs_update("app-git").await);
        assert!(!store.needs_update("unknown-pkg").await);
    }

    #[tokio::test]
    async fn test_update_then_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vcs.json");

        let fetcher = Arc::new(ScriptedFetcher {
            heads: [("e.com/r.git".to_string(), Some("abc123".to_string()))]
                .into_iter()
                .collect(),
        });

        let store = InfoStore::new(path.clone(), fetcher.clone());
        store
            .update("app-git", &["git+https://e.com/r.git".to_string()])
            .await
            .unwrap();

        let reloaded = InfoStore::load(path, fetcher);
        let data = reloaded.data.try_lock().unwrap();
        assert_eq!(data["app-git"]["e.com/r.git"].sha, "abc123");
    }

    #[tokio::test]
    async fn test_interrupted_update_keeps_answered_probes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vcs.json");

        // one source answers right away, the other never does
        let fetcher = Arc::new(ScriptedFetcher {
            heads: [
                ("fast.example/r.git".to_string(), Some("abc123".to_string())),
                ("stuck.example/r.git".to_string(), None),
            ]
            .into_iter()
            .collect(),
        });

        let store = InfoStore::new(path.clone(), fetcher.clone());
        let sources = vec![
            "git+https://fast.example/r.git".to_string(),
            "git+https://stuck.example/r.git".to_string(),
        ];
        let _ = tokio::time::timeout(
            Duration::from_millis(200),
            store.update("app-git", &sources),
        )
        .await;

        // the answered probe was persisted before the update was abandoned
        let reloaded = InfoStore::load(path, fetcher);
        let data = reloaded.data.try_lock().unwrap();
        assert_eq!(data["app-git"]["fast.example/r.git"].sha, "abc123");
    }

    #[tokio::test]
    async fn test_clean_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            &dir,
            vec![],
            vec![
                ("kept-git", vec![("a.example/r.git", "x")]),
                ("gone-git", vec![("b.example/r.git", "y")]),
            ],
        );

        store.clean_orphans(&["kept-git".to_string()]).await.unwrap();

        let tracked = store.tracked_packages().await;
        assert_eq!(tracked, vec!["kept-git".to_string()]);
    }
}

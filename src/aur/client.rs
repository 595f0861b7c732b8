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

//! AUR RPC client with caching and rate limiting.

use async_trait::async_trait;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{AurPackage, AurRpcResponse};
use crate::error::{AurumError, AurumResult};

/// Remote metadata queries, batched to minimize round trips.
#[async_trait]
pub trait AurClient: Send + Sync {
    /// Batched exact-name info query. Names absent from the AUR are simply
    /// missing from the result, not an error.
    async fn info(&self, names: &[String]) -> AurumResult<Vec<AurPackage>>;

    /// Search packages whose provides (or name) contain the needle.
    async fn search_provides(&self, needle: &str) -> AurumResult<Vec<AurPackage>>;
}

/// AUR RPC client backed by reqwest, with an in-memory LRU cache and a
/// persisted metadata snapshot consulted before going to the network.
pub struct RpcClient {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<RwLock<LruCache<String, CacheEntry>>>,
    snapshot_path: Option<PathBuf>,
    snapshot: Arc<RwLock<HashMap<String, AurPackage>>>,
    last_request: Arc<RwLock<Instant>>,
    min_request_interval: Duration,
}

#[derive(Clone)]
struct CacheEntry {
    info: AurPackage,
    cached_at: Instant,
}

const CACHE_TTL: Duration = Duration::from_secs(300);

// AUR RPC supports up to 250 packages per info request.
const BATCH_SIZE: usize = 250;

impl RpcClient {
    pub fn new(base_url: String, cache_size: usize, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .user_agent(concat!("aurum/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url,
            cache: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(cache_size.max(1)).unwrap(),
            ))),
            snapshot_path: None,
            snapshot: Arc::new(RwLock::new(HashMap::new())),
            last_request: Arc::new(RwLock::new(Instant::now())),
            min_request_interval: Duration::from_millis(100),
        }
    }

    /// Attach a metadata snapshot file, loading whatever it already holds.
    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        if let Ok(content) = std::fs::read_to_string(&path) {
            match serde_json::from_str::<HashMap<String, AurPackage>>(&content) {
                Ok(map) => {
                    debug!("loaded {} cached AUR records", map.len());
                    self.snapshot = Arc::new(RwLock::new(map));
                }
                Err(e) => warn!("ignoring unreadable metadata cache: {}", e),
            }
        }

        self.snapshot_path = Some(path);
        self
    }

    /// Rate limit requests to avoid hammering the AUR
    async fn rate_limit(&self) {
        let mut last = self.last_request.write().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_request_interval {
            tokio::time::sleep(self.min_request_interval - elapsed).await;
        }
        *last = Instant::now();
    }

    async fn rpc(&self, url: &str) -> AurumResult<Vec<AurPackage>> {
        self.rate_limit().await;

        let response: AurRpcResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AurumError::Network {
                url: url.to_string(),
                message: e.to_string(),
                source: Some(e),
            })?
            .json()
            .await
            .map_err(|e| AurumError::Network {
                url: url.to_string(),
                message: e.to_string(),
                source: Some(e),
            })?;

        if let Some(error) = response.error {
            return Err(AurumError::Rpc(error));
        }

        Ok(response.results)
    }

    async fn remember(&self, pkgs: &[AurPackage]) {
        {
            let mut cache = self.cache.write().await;
            for pkg in pkgs {
                cache.put(
                    pkg.name.clone(),
                    CacheEntry {
                        info: pkg.clone(),
                        cached_at: Instant::now(),
                    },
                );
            }
        }

        if self.snapshot_path.is_some() {
            let mut snapshot = self.snapshot.write().await;
            for pkg in pkgs {
                snapshot.insert(pkg.name.clone(), pkg.clone());
            }
        }

        self.persist_snapshot().await;
    }

    /// Best effort; a failed write only costs a re-query next run.
    async fn persist_snapshot(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };

        let snapshot = self.snapshot.read().await;
        match serde_json::to_string(&*snapshot) {
            Ok(json) => {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(path, json) {
                    warn!("failed to persist metadata cache: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize metadata cache: {}", e),
        }
    }
}

#[async_trait]
impl AurClient for RpcClient {
    async fn info(&self, names: &[String]) -> AurumResult<Vec<AurPackage>> {
        if names.is_empty() {
            return Ok(vec![]);
        }

        let mut found = Vec::new();
        let mut to_fetch = Vec::new();

        {
            let cache = self.cache.read().await;
            let snapshot = self.snapshot.read().await;

            for name in names {
                if let Some(entry) = cache.peek(name) {
                    if entry.cached_at.elapsed() < CACHE_TTL {
                        found.push(entry.info.clone());
                        continue;
                    }
                }

                if let Some(pkg) = snapshot.get(name) {
                    found.push(pkg.clone());
                    continue;
                }

                to_fetch.push(name.clone());
            }
        }

        for chunk in to_fetch.chunks(BATCH_SIZE) {
            let args: Vec<String> = chunk
                .iter()
                .map(|n| format!("arg[]={}", urlencoding::encode(n)))
                .collect();

            let url = format!("{}?v=5&type=info&{}", self.base_url, args.join("&"));
            let results = self.rpc(&url).await?;

            self.remember(&results).await;
            found.extend(results);
        }

        Ok(found)
    }

    async fn search_provides(&self, needle: &str) -> AurumResult<Vec<AurPackage>> {
        let url = format!(
            "{}?v=5&type=search&by=provides&arg={}",
            self.base_url,
            urlencoding::encode(needle)
        );

        let results = self.rpc(&url).await?;
        self.remember(&results).await;

        Ok(results)
    }
}

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

//! Configuration management with validation and defaults.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AurumError, AurumResult};

/// Main configuration structure for aurum
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AUR RPC base URL
    pub rpc_url: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Enable colored output
    pub color: bool,

    /// Directory holding per-pkgbase build directories
    pub build_dir: PathBuf,

    /// Path of the devel-package commit snapshot
    pub vcs_file: PathBuf,

    /// Path of the persisted AUR metadata cache
    pub metadata_cache: PathBuf,

    /// In-memory AUR metadata cache size (number of entries)
    pub aur_cache_size: usize,

    /// Hard timeout for one upstream revision probe, in seconds
    pub probe_timeout_secs: u64,

    /// Git binary used for revision probes
    pub git_bin: String,

    /// Packages never considered for upgrade
    pub ignore_pkg: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let cache = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("aurum");

        Self {
            rpc_url: "https://aur.archlinux.org/rpc/".to_string(),
            request_timeout_secs: 30,
            color: true,
            build_dir: cache.join("build"),
            vcs_file: cache.join("vcs.json"),
            metadata_cache: cache.join("packages.json"),
            aur_cache_size: 500,
            probe_timeout_secs: 5,
            git_bin: "git".to_string(),
            ignore_pkg: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. /etc/aurum/aurum.toml (system-wide)
    /// 2. ~/.config/aurum/config.toml (user)
    /// 3. Environment variables (AURUM_*)
    pub fn load() -> Self {
        let mut config = Config::default();

        let system_config = Path::new("/etc/aurum/aurum.toml");
        if system_config.exists() {
            if let Ok(content) = fs::read_to_string(system_config) {
                if let Ok(parsed) = toml::from_str::<Config>(&content) {
                    config = config.merge(parsed);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("aurum").join("config.toml");
            if user_config.exists() {
                if let Ok(content) = fs::read_to_string(user_config) {
                    if let Ok(parsed) = toml::from_str::<Config>(&content) {
                        config = config.merge(parsed);
                    }
                }
            }
        }

        config.apply_env_overrides()
    }

    /// Merge another config into this one (other takes precedence for non-default values)
    fn merge(mut self, other: Config) -> Self {
        let default = Config::default();

        if other.rpc_url != default.rpc_url {
            self.rpc_url = other.rpc_url;
        }
        if other.request_timeout_secs != default.request_timeout_secs {
            self.request_timeout_secs = other.request_timeout_secs;
        }
        if other.color != default.color {
            self.color = other.color;
        }
        if other.build_dir != default.build_dir {
            self.build_dir = other.build_dir;
        }
        if other.vcs_file != default.vcs_file {
            self.vcs_file = other.vcs_file;
        }
        if other.metadata_cache != default.metadata_cache {
            self.metadata_cache = other.metadata_cache;
        }
        if other.aur_cache_size != default.aur_cache_size {
            self.aur_cache_size = other.aur_cache_size;
        }
        if other.probe_timeout_secs != default.probe_timeout_secs {
            self.probe_timeout_secs = other.probe_timeout_secs;
        }
        if other.git_bin != default.git_bin {
            self.git_bin = other.git_bin;
        }
        if !other.ignore_pkg.is_empty() {
            self.ignore_pkg = other.ignore_pkg;
        }

        self
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("AURUM_RPC_URL") {
            self.rpc_url = val;
        }

        if let Ok(val) = std::env::var("AURUM_BUILD_DIR") {
            self.build_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("AURUM_VCS_FILE") {
            self.vcs_file = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("AURUM_PROBE_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.probe_timeout_secs = n;
            }
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> AurumResult<()> {
        fn invalid(message: &str) -> AurumError {
            AurumError::ConfigError {
                message: message.to_string(),
            }
        }

        if self.rpc_url.is_empty() {
            return Err(invalid("rpc_url must not be empty"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(invalid("probe_timeout_secs must be at least 1"));
        }
        if self.aur_cache_size == 0 {
            return Err(invalid("aur_cache_size must be at least 1"));
        }
        Ok(())
    }
}

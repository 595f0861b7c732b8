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

//! .SRCINFO parsing.
//!
//! A .SRCINFO file is a flat `key = value` listing: one `pkgbase` section of
//! defaults followed by one section per produced `pkgname`. A list key
//! appearing in a pkgname section overrides the base value entirely, even
//! when empty; architecture-suffixed keys (`depends_x86_64`) merge into
//! their bare counterpart.

use std::collections::HashMap;
use std::path::Path;

use crate::aur::AurPackage;
use crate::error::{AurumError, AurumResult};

const LIST_KEYS: &[&str] = &[
    "depends",
    "makedepends",
    "checkdepends",
    "optdepends",
    "provides",
    "conflicts",
    "replaces",
    "groups",
    "license",
    "source",
];

#[derive(Debug, Default, Clone)]
struct Section {
    name: String,
    scalars: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

impl Section {
    fn list(&self, key: &str) -> &[String] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parsed .SRCINFO: one pkgbase, one or more produced packages.
#[derive(Debug, Clone)]
pub struct Srcinfo {
    base: Section,
    packages: Vec<Section>,
}

impl Srcinfo {
    pub fn parse(content: &str) -> AurumResult<Self> {
        let mut base: Option<Section> = None;
        let mut packages: Vec<Section> = Vec::new();
        let mut current: Option<Section> = None;
        let mut in_base = false;

        let mut flush = |section: Option<Section>, was_base: bool, base: &mut Option<Section>| {
            if let Some(section) = section {
                if was_base {
                    *base = Some(section);
                } else {
                    packages.push(section);
                }
            }
        };

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or(AurumError::SrcinfoInvalid {
                line: lineno + 1,
                reason: "expected `key = value`".to_string(),
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "pkgbase" => {
                    if base.is_some() || in_base {
                        return Err(AurumError::SrcinfoInvalid {
                            line: lineno + 1,
                            reason: "duplicate pkgbase section".to_string(),
                        });
                    }
                    flush(current.take(), false, &mut base);
                    current = Some(Section {
                        name: value.to_string(),
                        ..Default::default()
                    });
                    in_base = true;
                }
                "pkgname" => {
                    flush(current.take(), in_base, &mut base);
                    in_base = false;
                    current = Some(Section {
                        name: value.to_string(),
                        ..Default::default()
                    });
                }
                _ => {
                    let section = current.as_mut().ok_or(AurumError::SrcinfoInvalid {
                        line: lineno + 1,
                        reason: format!("`{}` before any pkgbase", key),
                    })?;

                    // fold depends_x86_64 and friends into the bare key
                    let bare = key.split_once('_').map(|(k, _)| k).unwrap_or(key);
                    if LIST_KEYS.contains(&bare) {
                        let list = section.lists.entry(bare.to_string()).or_default();
                        if !value.is_empty() {
                            list.push(value.to_string());
                        }
                    } else {
                        section.scalars.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        flush(current.take(), in_base, &mut base);

        let base = base.ok_or(AurumError::SrcinfoInvalid {
            line: 0,
            reason: "missing pkgbase section".to_string(),
        })?;

        if packages.is_empty() {
            return Err(AurumError::SrcinfoInvalid {
                line: 0,
                reason: "no pkgname section".to_string(),
            });
        }

        Ok(Self { base, packages })
    }

    pub fn read(path: &Path) -> AurumResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AurumError::FileSystem {
            path: path.to_path_buf(),
            message: "failed to read .SRCINFO".to_string(),
            source: Some(e),
        })?;

        Self::parse(&content)
    }

    pub fn pkgbase(&self) -> &str {
        &self.base.name
    }

    /// `[epoch:]pkgver-pkgrel` assembled from the base section.
    pub fn version(&self) -> String {
        let pkgver = self.base.scalars.get("pkgver").map(String::as_str).unwrap_or("");
        let pkgrel = self.base.scalars.get("pkgrel").map(String::as_str).unwrap_or("1");

        match self.base.scalars.get("epoch") {
            Some(epoch) => format!("{}:{}-{}", epoch, pkgver, pkgrel),
            None => format!("{}-{}", pkgver, pkgrel),
        }
    }

    /// Normalize into the AUR record shape so the dependency expansion
    /// treats local build scripts exactly like remote packages.
    pub fn packages(&self) -> Vec<AurPackage> {
        let version = self.version();

        self.packages
            .iter()
            .map(|section| {
                let list = |key: &str| -> Vec<String> {
                    if section.lists.contains_key(key) {
                        section.list(key).to_vec()
                    } else {
                        self.base.list(key).to_vec()
                    }
                };

                AurPackage {
                    name: section.name.clone(),
                    package_base: self.base.name.clone(),
                    version: version.clone(),
                    description: section
                        .scalars
                        .get("pkgdesc")
                        .or_else(|| self.base.scalars.get("pkgdesc"))
                        .cloned(),
                    depends: list("depends"),
                    make_depends: self.base.list("makedepends").to_vec(),
                    check_depends: self.base.list("checkdepends").to_vec(),
                    opt_depends: list("optdepends"),
                    provides: list("provides"),
                    conflicts: list("conflicts"),
                    replaces: list("replaces"),
                    groups: list("groups"),
                    license: list("license"),
                    ..Default::default()
                }
            })
            .collect()
    }

    /// Source URLs, used for devel-package freshness tracking.
    pub fn sources(&self) -> &[String] {
        self.base.list("source")
    }
}

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

//! Shared doubles for resolver tests.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::aur::{AurClient, AurPackage};
use crate::error::AurumResult;

/// Canned AUR backend answering from a fixed package table.
pub struct FakeAur {
    pkgs: HashMap<String, AurPackage>,
}

impl FakeAur {
    pub fn new(pkgs: Vec<AurPackage>) -> Self {
        Self {
            pkgs: pkgs.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }
}

#[async_trait]
impl AurClient for FakeAur {
    async fn info(&self, names: &[String]) -> AurumResult<Vec<AurPackage>> {
        Ok(names.iter().filter_map(|n| self.pkgs.get(n).cloned()).collect())
    }

    async fn search_provides(&self, needle: &str) -> AurumResult<Vec<AurPackage>> {
        Ok(self
            .pkgs
            .values()
            .filter(|p| {
                p.name.contains(needle) || p.provides.iter().any(|prov| prov.contains(needle))
            })
            .cloned()
            .collect())
    }
}

pub fn aur_pkg(name: &str, base: &str, version: &str) -> AurPackage {
    AurPackage {
        name: name.into(),
        package_base: base.into(),
        version: version.into(),
        ..Default::default()
    }
}

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

//! Error types for resolution, sources and the on-disk stores.

use thiserror::Error;

/// Structural integrity violations of the dependency graph.
///
/// These are surfaced per edge/alias: the caller logs and skips the single
/// offending mutation instead of aborting the whole resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("self-referential dependencies not allowed")]
    SelfReferential,

    #[error("circular dependencies not allowed")]
    Circular,

    #[error("alias already defined")]
    ConflictingAlias,
}

/// Main error type for aurum operations
#[derive(Debug, Error)]
pub enum AurumError {
    /// Network errors during AUR RPC calls
    #[error("network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// AUR RPC answered with an error payload
    #[error("AUR RPC error: {0}")]
    Rpc(String),

    /// No source could claim a user-supplied target
    #[error("no package found for '{target}'")]
    TargetNotFound { target: String },

    /// .SRCINFO could not be parsed
    #[error("failed to parse .SRCINFO at line {line}: {reason}")]
    SrcinfoInvalid { line: usize, reason: String },

    /// Conflicts were found and the caller runs non-interactively
    #[error("package conflicts can not be resolved with noconfirm, aborting")]
    UnresolvableConflicts,

    /// Configuration errors
    #[error("configuration error: {message}")]
    ConfigError { message: String },

    /// File system errors
    #[error("file system error for '{}': {message}", .path.display())]
    FileSystem {
        path: std::path::PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Generic/wrapped error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for aurum operations
pub type AurumResult<T> = std::result::Result<T, AurumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AurumError::TargetNotFound {
            target: "test-pkg".to_string(),
        };
        assert_eq!(format!("{}", err), "no package found for 'test-pkg'");
    }

    #[test]
    fn test_graph_error_display() {
        assert_eq!(
            format!("{}", GraphError::Circular),
            "circular dependencies not allowed"
        );
        assert_eq!(
            format!("{}", GraphError::ConflictingAlias),
            "alias already defined"
        );
    }
}

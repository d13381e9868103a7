// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the bundler

use crate::module_system::ModuleId;
use crate::transform::TransformError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for build-time operations
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors that abort a build. None of them leave an artifact behind.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A raw specifier did not map to an existing file
    #[error("Cannot resolve '{specifier}' from '{importer}'")]
    Resolution {
        /// Module containing the specifier
        importer: ModuleId,
        /// Specifier as written in the source
        specifier: String,
    },

    /// The configured entry file does not exist
    #[error("Entry module not found: {}", path.display())]
    EntryNotFound {
        /// Entry path as configured
        path: PathBuf,
    },

    /// The source transformer rejected a module
    #[error("Failed to transform '{module}': {source}")]
    Transform {
        /// Module that failed to transform
        module: ModuleId,
        /// Transformer diagnostic
        source: TransformError,
    },

    /// Reading or writing storage failed
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A dependency edge points outside the graph
    #[error("Module '{module}' depends on '{target}', which is not in the graph")]
    BrokenGraph {
        /// Module owning the edge
        module: ModuleId,
        /// Missing target
        target: ModuleId,
    },

    /// Invalid build configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BundleError {
    /// Create an I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means a module could not be located
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::EntryNotFound { .. })
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Build configuration

use crate::error::{BundleError, Result};
use crate::module_system::DEFAULT_EXTENSIONS;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name
pub const CONFIG_FILE: &str = "minipack.config.json";

/// Where the bundle is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory
    pub path: PathBuf,
    /// Bundle file name
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dist"),
            filename: "bundle.js".to_string(),
        }
    }
}

/// Configuration for one build.
///
/// Relative paths are interpreted against `root`, which is the directory of
/// the config file when loaded from one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Entry module
    pub entry: PathBuf,

    /// Output location
    pub output: OutputConfig,

    /// Extensions probed for extensionless specifiers
    pub extensions: Vec<String>,

    /// Project root
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::new(),
            output: OutputConfig::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            root: PathBuf::from("."),
        }
    }
}

impl BundleConfig {
    /// Configuration for `entry` with default output, rooted at `root`
    pub fn new(root: impl Into<PathBuf>, entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file
    pub fn load(storage: &dyn Storage, path: &Path) -> Result<Self> {
        let content = storage
            .read_to_string(path)
            .map_err(|e| BundleError::io(path, e))?;
        let mut config = Self::from_json(&content)?;
        config.root = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config JSON; `root` is left at its default
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.entry.as_os_str().is_empty() {
            return Err(BundleError::Config("`entry` is required".to_string()));
        }
        if self.output.filename.is_empty() {
            return Err(BundleError::Config(
                "`output.filename` must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of the bundle file
    pub fn output_file(&self) -> PathBuf {
        self.root
            .join(&self.output.path)
            .join(&self.output.filename)
    }
}

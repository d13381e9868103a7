// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution
//!
//! Specifiers are resolved lexically against the importing module's
//! directory, then probed against storage: exact file, file plus each
//! extension, directory `index` plus each extension.

use crate::error::{BundleError, Result};
use crate::module_system::ModuleId;
use crate::storage::{Storage, normalize};
use std::path::{Component, Path, PathBuf};

/// Extensions probed when a specifier names no existing file
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs"];

/// Maps raw specifiers to canonical module identifiers
pub struct PathResolver<'s> {
    /// Project root, every id is relative to it
    root: PathBuf,
    /// Where existence probes go
    storage: &'s dyn Storage,
    /// File extensions to try
    extensions: Vec<String>,
}

impl<'s> PathResolver<'s> {
    /// Create a resolver for the project rooted at `root`
    pub fn new(root: impl Into<PathBuf>, storage: &'s dyn Storage) -> Self {
        Self {
            root: root.into(),
            storage,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Replace the probed extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.into();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        self
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `specifier` as written inside `importer`
    pub fn resolve(&self, importer: &ModuleId, specifier: &str) -> Result<ModuleId> {
        let not_found = || BundleError::Resolution {
            importer: importer.clone(),
            specifier: specifier.to_string(),
        };

        let raw = specifier.replace('\\', "/");
        if raw.trim().is_empty() {
            return Err(not_found());
        }

        let mut target = if raw.starts_with('/') {
            self.root.clone()
        } else {
            let mut dir = self.to_path(importer);
            dir.pop();
            dir
        };
        for part in raw.split('/').filter(|p| !p.is_empty()) {
            target.push(part);
        }

        self.probe(&target).ok_or_else(not_found)
    }

    /// Canonicalize the entry file, given relative to the root or absolute
    pub fn resolve_entry(&self, path: &Path) -> Result<ModuleId> {
        let target = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        self.probe(&target).ok_or_else(|| BundleError::EntryNotFound {
            path: path.to_path_buf(),
        })
    }

    /// Storage path of a module
    pub fn to_path(&self, id: &ModuleId) -> PathBuf {
        id.segments().fold(self.root.clone(), |path, seg| path.join(seg))
    }

    /// First existing candidate for `target`, as a canonical id
    fn probe(&self, target: &Path) -> Option<ModuleId> {
        let segments = self.segments_of(target)?;
        if segments.last().is_none_or(|s| s == "..") {
            return None;
        }

        let base = to_id(&segments);
        let mut candidates = vec![base.clone()];
        candidates.extend(self.extensions.iter().map(|ext| format!("{base}{ext}")));
        candidates.extend(
            self.extensions
                .iter()
                .map(|ext| format!("{base}/index{ext}")),
        );

        candidates
            .into_iter()
            .map(ModuleId::new)
            .find(|id| self.storage.is_file(&self.to_path(id)))
    }

    /// Root-relative segments of a lexically normalized `target`
    fn segments_of(&self, target: &Path) -> Option<Vec<String>> {
        let relative = pathdiff::diff_paths(normalize(target), normalize(&self.root))?;
        let segments = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect();
        Some(segments)
    }
}

fn to_id(segments: &[String]) -> String {
    let joined = segments.join("/");
    if segments.first().is_some_and(|s| s == "..") {
        joined
    } else {
        format!("./{joined}")
    }
}

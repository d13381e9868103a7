// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Storage backends for reading sources and writing artifacts

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Where module sources come from and where bundles go
pub trait Storage: Send + Sync {
    /// Read a whole file as UTF-8
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Check whether `path` is an existing file
    fn is_file(&self, path: &Path) -> bool;

    /// Check whether `path` is an existing directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Write `contents` to `path`, creating missing parent directories
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// The local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        match std::fs::write(path, contents) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    tracing::debug!("creating output directory {}", parent.display());
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, contents)
            }
            other => other,
        }
    }
}

/// In-memory file tree.
///
/// Paths are compared after lexical normalization, so `a/./b.js` and
/// `a/b.js` name the same file. Directories exist implicitly whenever a file
/// lives beneath them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<PathBuf, String>>,
}

impl MemoryStorage {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files
            .write()
            .insert(normalize(path.as_ref()), contents.into());
    }

    /// Builder-style [`MemoryStorage::insert`]
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Get a file's contents
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.read().get(&normalize(path.as_ref())).cloned()
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Check if no files are stored
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(&normalize(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize(path);
        self.files
            .read()
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.insert(path, contents);
        Ok(())
    }
}

/// Lexically resolve `.` and `..` components
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

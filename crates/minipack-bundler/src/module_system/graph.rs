// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records and the dependency graph

use crate::error::{BundleError, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;

/// Canonical module identifier.
///
/// A `/`-separated path relative to the project root, starting with `./`
/// (or `../` for files outside the root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Wrap an already canonical identifier
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments after the leading `./`
    pub(crate) fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| *s != ".")
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ModuleId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModuleId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One transformed module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Canonical identifier
    pub id: ModuleId,
    /// Transformed source
    pub code: String,
    /// Raw specifier → canonical identifier, in order of first appearance
    pub dependencies: IndexMap<String, ModuleId>,
}

/// The closed set of modules reachable from an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    entry: ModuleId,
    modules: IndexMap<ModuleId, ModuleRecord>,
}

impl Graph {
    pub(crate) fn new(entry: ModuleId) -> Self {
        Self {
            entry,
            modules: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, record: ModuleRecord) {
        self.modules.insert(record.id.clone(), record);
    }

    /// Entry module identifier
    pub fn entry(&self) -> &ModuleId {
        &self.entry
    }

    /// Look up a module
    pub fn get(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    /// Check whether a module is part of the graph
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Modules in discovery order, entry first
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    /// Module identifiers in discovery order
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the graph has no modules
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Check that the entry and every dependency target are in the graph
    pub fn verify_closure(&self) -> Result<()> {
        if !self.contains(self.entry.as_str()) {
            return Err(BundleError::BrokenGraph {
                module: self.entry.clone(),
                target: self.entry.clone(),
            });
        }
        for record in self.modules() {
            for target in record.dependencies.values() {
                if !self.contains(target.as_str()) {
                    return Err(BundleError::BrokenGraph {
                        module: record.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

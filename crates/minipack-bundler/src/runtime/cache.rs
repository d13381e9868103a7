// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Exports cache for the runtime loader

use crate::runtime::loader::RuntimeError;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// A module's exports container.
///
/// Cloning shares the container; [`Exports::ptr_eq`] tells whether two
/// handles are the same container.
#[derive(Debug, Clone, Default)]
pub struct Exports(Rc<RefCell<Map<String, Value>>>);

impl Exports {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an export
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    /// Set an export
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(name.into(), value.into());
    }

    /// Exported names
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check if nothing is exported yet
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Check whether two handles share one container
    pub fn ptr_eq(&self, other: &Exports) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Copy of the current contents as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.borrow().clone())
    }
}

/// What one `require` left behind for a module.
///
/// Written when the module starts executing and never removed.
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// Container handed to every importer
    pub exports: Exports,
    /// Top-level code ran to completion
    pub loaded: bool,
    /// What the module's code raised, if it failed
    pub error: Option<RuntimeError>,
}

/// Exports of every module that has started executing
#[derive(Debug, Default)]
pub struct ExportsCache {
    entries: FxHashMap<String, CachedModule>,
}

impl ExportsCache {
    /// A cache with nothing required yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached module by id
    pub fn get(&self, id: &str) -> Option<&CachedModule> {
        self.entries.get(id)
    }

    /// Whether `id` has ever started executing
    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Record a module that is about to execute
    pub(crate) fn begin(&mut self, id: &str) -> Exports {
        let exports = Exports::new();
        self.entries.insert(
            id.to_string(),
            CachedModule {
                exports: exports.clone(),
                loaded: false,
                error: None,
            },
        );
        exports
    }

    /// Mark a module as fully executed
    pub(crate) fn finish(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.loaded = true;
        }
    }

    /// Record the error a module raised; the entry stays
    pub(crate) fn fail(&mut self, id: &str, error: RuntimeError) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.error = Some(error);
        }
    }

    /// Ids of modules that have started executing, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of modules that have started executing
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been required
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports_handles_share_container() {
        let exports = Exports::new();
        let alias = exports.clone();
        alias.set("value", 3);

        assert!(exports.ptr_eq(&alias));
        assert_eq!(exports.get("value"), Some(Value::from(3)));
        assert!(!exports.ptr_eq(&Exports::new()));
    }

    #[test]
    fn test_cache_lifecycle() {
        let mut cache = ExportsCache::new();
        let exports = cache.begin("./a.js");
        assert!(!cache.get("./a.js").unwrap().loaded);

        cache.finish("./a.js");
        let entry = cache.get("./a.js").unwrap();
        assert!(entry.loaded);
        assert!(entry.exports.ptr_eq(&exports));

        assert!(entry.error.is_none());
    }

    #[test]
    fn test_failed_entry_is_kept() {
        let mut cache = ExportsCache::new();
        cache.begin("./boom.js");
        cache.fail("./boom.js", RuntimeError::Thrown(Value::from("boom")));

        let entry = cache.get("./boom.js").unwrap();
        assert!(!entry.loaded);
        assert_eq!(entry.error, Some(RuntimeError::Thrown(Value::from("boom"))));
        assert_eq!(cache.len(), 1);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dependency graph construction

use crate::error::{BundleError, Result};
use crate::module_system::{Graph, ModuleId, ModuleRecord, PathResolver};
use crate::storage::Storage;
use crate::transform::{SourceTransformer, Transformed};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reads and transforms one wave, returning results in wave order
type LoadWave<'a> = fn(&GraphBuilder<'a>, &[ModuleId]) -> Vec<Result<Transformed>>;

/// Builds a closed [`Graph`] from an entry module.
///
/// Modules are processed in breadth-first waves. A module enters the visited
/// set the moment it is first referenced, so it is read and transformed
/// exactly once no matter how many importers (or cycles) lead back to it.
pub struct GraphBuilder<'a> {
    /// Specifier resolution
    resolver: PathResolver<'a>,
    /// Source reads
    storage: &'a dyn Storage,
    /// Source transformation
    transformer: &'a dyn SourceTransformer,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder
    pub fn new(
        resolver: PathResolver<'a>,
        storage: &'a dyn Storage,
        transformer: &'a dyn SourceTransformer,
    ) -> Self {
        Self {
            resolver,
            storage,
            transformer,
        }
    }

    /// The resolver in use
    pub fn resolver(&self) -> &PathResolver<'a> {
        &self.resolver
    }

    /// Resolve the entry file and build its graph
    pub fn build_from_path(&self, entry: &Path) -> Result<Graph> {
        let entry = self.resolver.resolve_entry(entry)?;
        self.build(&entry)
    }

    /// Build the graph reachable from `entry`
    pub fn build(&self, entry: &ModuleId) -> Result<Graph> {
        #[cfg(feature = "parallel")]
        let load_wave: LoadWave<'a> = Self::load_parallel;
        #[cfg(not(feature = "parallel"))]
        let load_wave: LoadWave<'a> = Self::load_sequential;
        self.build_with(entry, load_wave)
    }

    fn build_with(&self, entry: &ModuleId, load_wave: LoadWave<'a>) -> Result<Graph> {
        let started = Instant::now();
        let mut graph = Graph::new(entry.clone());
        let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
        visited.insert(entry.clone());

        let mut wave = vec![entry.clone()];
        while !wave.is_empty() {
            let loaded = load_wave(self, &wave);

            let mut next = Vec::new();
            for (id, result) in wave.into_iter().zip(loaded) {
                let transformed = result?;
                let mut dependencies = IndexMap::with_capacity(transformed.specifiers.len());

                for specifier in transformed.specifiers {
                    if dependencies.contains_key(&specifier) {
                        tracing::warn!("{id} lists '{specifier}' more than once");
                        continue;
                    }
                    let target = self.resolver.resolve(&id, &specifier)?;
                    if visited.insert(target.clone()) {
                        next.push(target.clone());
                    }
                    dependencies.insert(specifier, target);
                }

                tracing::debug!("{id}: {} dependencies", dependencies.len());
                graph.insert(ModuleRecord {
                    id,
                    code: transformed.code,
                    dependencies,
                });
            }
            wave = next;
        }

        tracing::info!(
            "built graph of {} modules from {entry} in {:?}",
            graph.len(),
            started.elapsed()
        );
        Ok(graph)
    }

    /// Read and transform every module of one wave on rayon's pool
    #[cfg(feature = "parallel")]
    fn load_parallel(&self, wave: &[ModuleId]) -> Vec<Result<Transformed>> {
        wave.par_iter().map(|id| self.load(id)).collect()
    }

    #[cfg_attr(feature = "parallel", allow(dead_code))]
    fn load_sequential(&self, wave: &[ModuleId]) -> Vec<Result<Transformed>> {
        wave.iter().map(|id| self.load(id)).collect()
    }

    fn load(&self, id: &ModuleId) -> Result<Transformed> {
        let path = self.resolver.to_path(id);
        let source = self
            .storage
            .read_to_string(&path)
            .map_err(|e| BundleError::io(&path, e))?;

        self.transformer
            .transform(&source)
            .map_err(|source| BundleError::Transform {
                module: id.clone(),
                source,
            })
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Build pipeline: config, graph, serialize, write

use crate::bundle::serialize;
use crate::config::BundleConfig;
use crate::error::{BundleError, Result};
use crate::module_system::{Graph, GraphBuilder, PathResolver};
use crate::storage::{FsStorage, Storage};
use crate::transform::{EsmTransformer, SourceTransformer};
use std::path::PathBuf;
use std::sync::Arc;

/// A serialized bundle that has not been written yet
#[derive(Debug)]
pub struct Artifact {
    /// The graph the bundle was built from
    pub graph: Graph,
    /// Bundle source
    pub code: String,
}

impl Artifact {
    /// Number of modules in the bundle
    pub fn module_count(&self) -> usize {
        self.graph.len()
    }
}

/// Runs a whole build.
///
/// Nothing is written until the graph is complete and serialized, so a
/// failed build never leaves a bundle behind.
#[derive(Clone)]
pub struct Bundler {
    config: BundleConfig,
    storage: Arc<dyn Storage>,
    transformer: Arc<dyn SourceTransformer>,
}

impl Bundler {
    /// Bundler over the local file system with the ESM transformer
    pub fn new(config: BundleConfig) -> Self {
        Self {
            config,
            storage: Arc::new(FsStorage),
            transformer: Arc::new(EsmTransformer::new()),
        }
    }

    /// Use a different storage backend
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Use a different source transformer
    pub fn with_transformer(mut self, transformer: Arc<dyn SourceTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// The build configuration
    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Build and check the module graph
    pub fn graph(&self) -> Result<Graph> {
        self.config.validate()?;

        let resolver = PathResolver::new(&self.config.root, self.storage.as_ref())
            .with_extensions(&self.config.extensions);
        let builder = GraphBuilder::new(resolver, self.storage.as_ref(), self.transformer.as_ref());
        let graph = builder.build_from_path(&self.config.entry)?;
        graph.verify_closure()?;
        Ok(graph)
    }

    /// Build and serialize without writing
    pub fn bundle(&self) -> Result<Artifact> {
        let graph = self.graph()?;
        let code = serialize(&graph)?;
        Ok(Artifact { graph, code })
    }

    /// Write `artifact` to the configured output file
    pub fn write(&self, artifact: &Artifact) -> Result<PathBuf> {
        let path = self.config.output_file();
        self.storage
            .write(&path, &artifact.code)
            .map_err(|e| BundleError::io(&path, e))?;
        tracing::info!(
            "wrote {} ({} modules, {} bytes)",
            path.display(),
            artifact.module_count(),
            artifact.code.len()
        );
        Ok(path)
    }

    /// Build, serialize and write in one step
    pub fn run(&self) -> Result<(Artifact, PathBuf)> {
        let artifact = self.bundle()?;
        let path = self.write(&artifact)?;
        Ok((artifact, path))
    }
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::path::Path;

    fn project() -> Arc<MemoryStorage> {
        Arc::new(
            MemoryStorage::new()
                .with_file(
                    "/app/src/entry.js",
                    "import message from './message';\nexport const value = 1 + 2;\nexport { message };\n",
                )
                .with_file("/app/src/message.js", "export default 'x';\n"),
        )
    }

    fn bundler(storage: Arc<MemoryStorage>) -> Bundler {
        Bundler::new(BundleConfig::new("/app", "src/entry.js")).with_storage(storage)
    }

    #[test]
    fn test_run_writes_bundle() {
        let storage = project();
        let (artifact, path) = bundler(storage.clone()).run().unwrap();

        assert_eq!(path, Path::new("/app/dist/bundle.js"));
        assert_eq!(artifact.module_count(), 2);
        assert_eq!(artifact.graph.entry(), "./src/entry.js");
        assert_eq!(storage.get(&path).as_deref(), Some(artifact.code.as_str()));
        assert!(artifact.code.contains("return require(\"./src/entry.js\");"));
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let storage = Arc::new(
            MemoryStorage::new().with_file("/app/src/entry.js", "import x from './missing';\n"),
        );
        let err = bundler(storage.clone()).run().unwrap_err();

        assert!(err.is_resolution());
        assert!(err.to_string().contains("./missing"));
        assert_eq!(storage.len(), 1);
        assert!(storage.get("/app/dist/bundle.js").is_none());
    }

    #[test]
    fn test_transform_failure_writes_nothing() {
        let storage = Arc::new(
            MemoryStorage::new().with_file("/app/src/entry.js", "export const { a } = obj;\n"),
        );
        let err = bundler(storage.clone()).run().unwrap_err();

        assert!(matches!(err, BundleError::Transform { .. }));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_commented_out_require_is_ignored() {
        let storage = Arc::new(MemoryStorage::new().with_file(
            "/app/src/entry.js",
            "// migrated away from require('./legacy.js')\nexports.value = 1;\n",
        ));
        let artifact = bundler(storage).bundle().unwrap();

        assert_eq!(artifact.module_count(), 1);
        assert!(artifact.graph.get("./src/entry.js").unwrap().dependencies.is_empty());
    }

    #[test]
    fn test_missing_entry() {
        let storage = Arc::new(MemoryStorage::new());
        let err = bundler(storage).bundle().unwrap_err();
        assert!(matches!(err, BundleError::EntryNotFound { .. }));
    }

    #[test]
    fn test_custom_output() {
        let storage = project();
        let mut config = BundleConfig::new("/app", "./src/entry.js");
        config.output.path = PathBuf::from("build");
        config.output.filename = "app.js".to_string();

        let (_, path) = Bundler::new(config).with_storage(storage.clone()).run().unwrap();
        assert_eq!(path, Path::new("/app/build/app.js"));
        assert!(storage.get("/app/build/app.js").is_some());
    }
}

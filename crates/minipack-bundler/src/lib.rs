// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # minipack-bundler
//!
//! A small JavaScript module bundler.
//!
//! Starting from one entry file, the bundler discovers every module reachable
//! through relative `import`/`require` references and emits a single script
//! that runs the original program:
//!
//! - each module's code runs once, in its own scope
//! - modules see only `require` and `exports`
//! - import cycles terminate and observe partial exports
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use minipack_bundler::{BundleConfig, Bundler};
//!
//! fn main() -> minipack_bundler::Result<()> {
//!     let config = BundleConfig::new(".", "src/index.js");
//!     let (artifact, path) = Bundler::new(config).run()?;
//!     println!("{} modules -> {}", artifact.module_count(), path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! - [`module_system`]: path resolution and graph building
//! - [`transform`]: ES module syntax lowered to `require`/`exports`
//! - [`bundle`]: graph serialization and the embedded loader
//! - [`runtime`]: the loader protocol, natively
//!
//! ## Features
//!
//! - `parallel` (default): transform each breadth-first wave on rayon's pool

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod bundler;
pub mod config;
pub mod error;
pub mod module_system;
pub mod runtime;
pub mod storage;
pub mod transform;

// Re-exports
pub use bundle::serialize;
pub use bundler::{Artifact, Bundler};
pub use config::{BundleConfig, OutputConfig, CONFIG_FILE};
pub use error::{BundleError, Result};
pub use module_system::{Graph, GraphBuilder, ModuleId, ModuleRecord, PathResolver};
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use transform::{EsmTransformer, SourceTransformer, TransformError, Transformed};

/// Version of minipack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

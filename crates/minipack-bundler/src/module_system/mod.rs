// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Build-time module system
//!
//! Turns an entry file into a closed [`Graph`] of transformed modules.
//!
//! ## Pieces
//! - [`PathResolver`]: raw specifier + importing module → canonical [`ModuleId`]
//! - [`GraphBuilder`]: breadth-first traversal with a visited set, so every
//!   module is transformed once and import cycles terminate
//! - [`Graph`]: the ordered, deduplicated result handed to the serializer

mod builder;
mod graph;
mod resolver;

pub use builder::GraphBuilder;
pub use graph::{Graph, ModuleId, ModuleRecord};
pub use resolver::{DEFAULT_EXTENSIONS, PathResolver};

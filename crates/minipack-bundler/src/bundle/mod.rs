// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bundle serialization
//!
//! A bundle is one self-invoking script:
//!
//! ```text
//! (function () {
//!   var graph = { "<id>": { "dependencies": { ... }, "code": "..." }, ... };
//!   <runtime loader>
//!   return require("<entry id>");
//! })();
//! ```
//!
//! The graph is plain JSON data and module code is embedded verbatim. The
//! script evaluates to the entry module's exports.

use crate::error::Result;
use crate::module_system::{Graph, ModuleId};
use indexmap::IndexMap;
use serde::Serialize;

/// Runtime loader embedded in every bundle
pub const RUNTIME_LOADER: &str = include_str!("loader.js");

#[derive(Serialize)]
struct EmbeddedModule<'a> {
    dependencies: &'a IndexMap<String, ModuleId>,
    code: &'a str,
}

/// Render `graph` as a standalone script
pub fn serialize(graph: &Graph) -> Result<String> {
    let modules: IndexMap<&str, EmbeddedModule<'_>> = graph
        .modules()
        .map(|record| {
            (
                record.id.as_str(),
                EmbeddedModule {
                    dependencies: &record.dependencies,
                    code: &record.code,
                },
            )
        })
        .collect();

    let data = serde_json::to_string_pretty(&modules)?.replace('\n', "\n  ");
    let entry = serde_json::to_string(graph.entry().as_str())?;

    tracing::debug!("serialized {} modules ({} bytes of data)", graph.len(), data.len());

    Ok(format!(
        "// minipack bundle: entry {}, {} modules\n(function () {{\n  var graph = {data};\n\n{RUNTIME_LOADER}\n  return require({entry});\n}})();\n",
        graph.entry(),
        graph.len(),
    ))
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end builds against the real file system

use minipack_bundler::runtime::{Frame, Loader, RuntimeError};
use minipack_bundler::{BundleConfig, BundleError, Bundler, CONFIG_FILE};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn build(dir: &Path) -> minipack_bundler::Result<(minipack_bundler::Artifact, std::path::PathBuf)> {
    let config = BundleConfig::load(&minipack_bundler::FsStorage, &dir.join(CONFIG_FILE))?;
    Bundler::new(config).run()
}

fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Evaluate a bundle under node and return the entry's exports as JSON
fn run_under_node(dir: &Path, bundle: &str) -> Option<Value> {
    if !node_available() {
        eprintln!("node not found on PATH, skipping execution");
        return None;
    }

    let script = dir.join("run.js");
    fs::write(
        &script,
        format!("var result = {bundle}\nconsole.log(JSON.stringify(result));\n"),
    )
    .unwrap();

    let out = Command::new("node").arg(&script).output().unwrap();
    assert!(
        out.status.success(),
        "node failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    Some(serde_json::from_slice(&out.stdout).unwrap())
}

const CONFIG: &str = r#"{ "entry": "src/entry.js", "output": { "path": "dist", "filename": "bundle.js" } }"#;

#[test]
fn test_esm_project_end_to_end() {
    let dir = project(&[
        (CONFIG_FILE, CONFIG),
        (
            "src/entry.js",
            "import message from './message';\nimport { shout } from './util/index.js';\n\nexport const value = 1 + 2;\nexport const loud = shout(message);\n",
        ),
        ("src/message.js", "export default 'x';\n"),
        (
            "src/util/index.js",
            "export function shout(s) {\n  return s.toUpperCase();\n}\n",
        ),
    ]);

    let (artifact, path) = build(dir.path()).unwrap();
    assert_eq!(path, dir.path().join("dist/bundle.js"));
    assert_eq!(fs::read_to_string(&path).unwrap(), artifact.code);

    let ids: Vec<_> = artifact.graph.ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, ["./src/entry.js", "./src/message.js", "./src/util/index.js"]);

    if let Some(result) = run_under_node(dir.path(), &artifact.code) {
        assert_eq!(result["value"], 3);
        assert_eq!(result["loud"], "X");
    }
}

#[test]
fn test_cycle_observes_partial_exports() {
    let dir = project(&[
        (CONFIG_FILE, CONFIG),
        (
            "src/entry.js",
            "exports.early = 'a';\nvar b = require('./b');\nexports.seen = b.seen;\nexports.late = 'a2';\n",
        ),
        (
            "src/b.js",
            "var a = require('./entry.js');\nexports.seen = Object.keys(a).join(',');\n",
        ),
    ]);

    let (artifact, _) = build(dir.path()).unwrap();
    assert_eq!(artifact.module_count(), 2);

    if let Some(result) = run_under_node(dir.path(), &artifact.code) {
        assert_eq!(result["seen"], "early");
        assert_eq!(result["late"], "a2");
    }
}

#[test]
fn test_module_runs_once() {
    let dir = project(&[
        (CONFIG_FILE, CONFIG),
        (
            "src/entry.js",
            "var first = require('./counter');\nvar second = require('../src/counter.js');\nexports.runs = globalThis.runs;\nexports.same = first === second;\n",
        ),
        (
            "src/counter.js",
            "globalThis.runs = (globalThis.runs || 0) + 1;\n",
        ),
    ]);

    let (artifact, _) = build(dir.path()).unwrap();
    let entry = artifact.graph.get("./src/entry.js").unwrap();
    assert_eq!(entry.dependencies.len(), 2);
    assert!(entry.dependencies.values().all(|id| id == "./src/counter.js"));

    if let Some(result) = run_under_node(dir.path(), &artifact.code) {
        assert_eq!(result["runs"], 1);
        assert_eq!(result["same"], true);
    }
}

#[test]
fn test_failed_module_is_not_rerun() {
    let dir = project(&[
        (CONFIG_FILE, CONFIG),
        (
            "src/entry.js",
            "var messages = [];\nfor (var i = 0; i < 2; i++) {\n  try { require('./boom.js'); } catch (e) { messages.push(e.message); }\n}\nexports.runs = globalThis.boomRuns;\nexports.messages = messages;\n",
        ),
        (
            "src/boom.js",
            "globalThis.boomRuns = (globalThis.boomRuns || 0) + 1;\nthrow new Error('boom');\n",
        ),
    ]);

    let (artifact, _) = build(dir.path()).unwrap();
    assert_eq!(artifact.module_count(), 2);

    if let Some(result) = run_under_node(dir.path(), &artifact.code) {
        assert_eq!(result["runs"], 1);
        assert_eq!(result["messages"], serde_json::json!(["boom", "boom"]));
    }
}

#[test]
fn test_missing_dependency_writes_nothing() {
    let dir = project(&[
        (CONFIG_FILE, CONFIG),
        ("src/entry.js", "import x from './missing.js';\n"),
    ]);

    let err = build(dir.path()).unwrap_err();
    assert!(matches!(err, BundleError::Resolution { .. }));
    assert!(err.to_string().contains("./missing.js"));
    assert!(!dir.path().join("dist").exists());
}

/// Executes `require("...")` calls and `exports.name = <json>;` lines only
fn toy_evaluator() -> impl Fn(&str, &mut Frame<'_, '_>) -> Result<(), RuntimeError> {
    let require = Regex::new(r#"require\("([^"]+)"\)"#).unwrap();
    let assign = Regex::new(r"(?m)^exports\.(\w+) = (.+);$").unwrap();

    move |code: &str, frame: &mut Frame<'_, '_>| {
        for caps in require.captures_iter(code) {
            frame.require(&caps[1])?;
        }
        for caps in assign.captures_iter(code) {
            let value: Value = serde_json::from_str(&caps[2]).unwrap_or(Value::Null);
            frame.exports().set(&caps[1], value);
        }
        Ok(())
    }
}

#[test]
fn test_native_loader_runs_built_graph() {
    let dir = project(&[
        (CONFIG_FILE, CONFIG),
        (
            "src/entry.js",
            "require(\"./a.js\");\nrequire(\"./b.js\");\nexports.value = 3;\n",
        ),
        ("src/a.js", "require(\"./b.js\");\nexports.name = \"a\";\n"),
        ("src/b.js", "require(\"./a.js\");\nexports.name = \"b\";\n"),
    ]);

    let (artifact, _) = build(dir.path()).unwrap();
    let mut loader = Loader::new(&artifact.graph, toy_evaluator());
    let exports = loader.run().unwrap();

    assert_eq!(exports.get("value"), Some(Value::from(3)));
    assert_eq!(loader.cache().len(), 3);
    for id in artifact.graph.ids() {
        assert!(loader.cache().get(id.as_str()).unwrap().loaded);
    }
}

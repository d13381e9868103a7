// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native rendition of the bundle runtime loader

use crate::module_system::{Graph, ModuleId, ModuleRecord};
use crate::runtime::cache::{ExportsCache, Exports};
use serde_json::Value;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised while executing a bundle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// The requested id is not part of the bundle
    #[error("Cannot find module '{id}' in bundle")]
    Lookup {
        /// Requested canonical id
        id: String,
    },

    /// Module code required a specifier the builder never saw
    #[error("Module '{module}' has no dependency '{specifier}'")]
    UnmappedSpecifier {
        /// Requiring module
        module: ModuleId,
        /// Raw specifier
        specifier: String,
    },

    /// Module code threw; the value is passed through untouched
    #[error("Uncaught {0}")]
    Thrown(Value),
}

/// Lifecycle of one module inside a loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Never required
    Unvisited,
    /// Top-level code is running
    Executing,
    /// Executed, exports are final
    Cached,
    /// Top-level code raised an error; requiring it raises the same error
    Failed,
}

/// Runs module code.
///
/// The code may only see the frame: its exports container and its relative
/// `require`.
pub trait Evaluate {
    /// Execute `code` once inside `frame`
    fn evaluate(&self, code: &str, frame: &mut Frame<'_, '_>) -> Result<(), RuntimeError>;
}

impl<F> Evaluate for F
where
    F: Fn(&str, &mut Frame<'_, '_>) -> Result<(), RuntimeError>,
{
    fn evaluate(&self, code: &str, frame: &mut Frame<'_, '_>) -> Result<(), RuntimeError> {
        self(code, frame)
    }
}

/// Scope of one module's single execution
pub struct Frame<'a, 'g> {
    loader: &'a mut Loader<'g>,
    record: &'g ModuleRecord,
    exports: Exports,
}

impl Frame<'_, '_> {
    /// Module being executed
    pub fn id(&self) -> &ModuleId {
        &self.record.id
    }

    /// The module's exports container
    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    /// `require(specifier)` as written in the module's source
    pub fn require(&mut self, specifier: &str) -> Result<Exports, RuntimeError> {
        let record = self.record;
        let target = record.dependencies.get(specifier).ok_or_else(|| {
            RuntimeError::UnmappedSpecifier {
                module: record.id.clone(),
                specifier: specifier.to_string(),
            }
        })?;
        self.loader.require(target.as_str())
    }
}

/// Executes modules of a [`Graph`] on demand, at most once each.
///
/// Owns its [`ExportsCache`], so independent loaders never share state.
/// Single-threaded: the loader is neither `Send` nor `Sync`.
pub struct Loader<'g> {
    graph: &'g Graph,
    cache: ExportsCache,
    evaluator: Rc<dyn Evaluate>,
}

impl<'g> Loader<'g> {
    /// Create a loader over `graph`
    pub fn new(graph: &'g Graph, evaluator: impl Evaluate + 'static) -> Self {
        Self {
            graph,
            cache: ExportsCache::new(),
            evaluator: Rc::new(evaluator),
        }
    }

    /// Require the graph's entry module
    pub fn run(&mut self) -> Result<Exports, RuntimeError> {
        let graph = self.graph;
        self.require(graph.entry().as_str())
    }

    /// Require a module by canonical id
    pub fn require(&mut self, id: &str) -> Result<Exports, RuntimeError> {
        if let Some(cached) = self.cache.get(id) {
            if let Some(err) = &cached.error {
                return Err(err.clone());
            }
            if !cached.loaded {
                tracing::trace!("{id} required during its own execution");
            }
            return Ok(cached.exports.clone());
        }

        let graph = self.graph;
        let record = graph.get(id).ok_or_else(|| RuntimeError::Lookup {
            id: id.to_string(),
        })?;

        let exports = self.cache.begin(id);
        let evaluator = Rc::clone(&self.evaluator);
        let mut frame = Frame {
            loader: &mut *self,
            record,
            exports: exports.clone(),
        };

        match evaluator.evaluate(&record.code, &mut frame) {
            Ok(()) => {
                self.cache.finish(id);
                Ok(exports)
            }
            Err(err) => {
                tracing::debug!("{id} failed: {err}");
                self.cache.fail(id, err.clone());
                Err(err)
            }
        }
    }

    /// Where a module is in its lifecycle
    pub fn state(&self, id: &str) -> ModuleState {
        match self.cache.get(id) {
            None => ModuleState::Unvisited,
            Some(entry) if entry.error.is_some() => ModuleState::Failed,
            Some(entry) if entry.loaded => ModuleState::Cached,
            Some(_) => ModuleState::Executing,
        }
    }

    /// The loader's exports cache
    pub fn cache(&self) -> &ExportsCache {
        &self.cache
    }

    /// The graph being executed
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::cell::RefCell;
    use std::collections::HashMap;

    type Script = Box<dyn Fn(&mut Frame<'_, '_>) -> Result<(), RuntimeError>>;

    /// Runs a Rust closure per module id and counts executions
    #[derive(Default)]
    struct Scripted {
        scripts: HashMap<String, Script>,
        runs: Rc<RefCell<HashMap<String, usize>>>,
    }

    impl Scripted {
        fn module(
            mut self,
            id: &str,
            script: impl Fn(&mut Frame<'_, '_>) -> Result<(), RuntimeError> + 'static,
        ) -> Self {
            self.scripts.insert(id.to_string(), Box::new(script));
            self
        }
    }

    impl Evaluate for Scripted {
        fn evaluate(&self, _code: &str, frame: &mut Frame<'_, '_>) -> Result<(), RuntimeError> {
            let id = frame.id().to_string();
            *self.runs.borrow_mut().entry(id.clone()).or_default() += 1;
            match self.scripts.get(&id) {
                Some(script) => script(frame),
                None => Ok(()),
            }
        }
    }

    fn graph(modules: &[(&str, &[(&str, &str)])]) -> Graph {
        let mut graph = Graph::new(ModuleId::new(modules[0].0));
        for (id, deps) in modules {
            graph.insert(ModuleRecord {
                id: ModuleId::new(*id),
                code: format!("/* {id} */"),
                dependencies: deps
                    .iter()
                    .map(|(raw, target)| (raw.to_string(), ModuleId::new(*target)))
                    .collect::<IndexMap<_, _>>(),
            });
        }
        graph
    }

    #[test]
    fn test_end_to_end_exports() {
        let graph = graph(&[
            ("./src/entry.js", &[("./m.js", "./src/m.js")]),
            ("./src/m.js", &[]),
        ]);
        let scripted = Scripted::default()
            .module("./src/entry.js", |frame| {
                let m = frame.require("./m.js")?;
                assert_eq!(m.get("value"), Some(Value::from("x")));
                frame.exports().set("value", 1 + 2);
                Ok(())
            })
            .module("./src/m.js", |frame| {
                frame.exports().set("value", "x");
                Ok(())
            });

        let mut loader = Loader::new(&graph, scripted);
        let exports = loader.run().unwrap();

        assert_eq!(exports.get("value"), Some(Value::from(3)));
        assert!(loader.cache().has("./src/entry.js"));
        assert!(loader.cache().has("./src/m.js"));
        assert_eq!(loader.cache().len(), 2);
    }

    #[test]
    fn test_module_executes_once() {
        let graph = graph(&[
            ("./entry.js", &[("./m", "./m.js"), ("./m.js", "./m.js")]),
            ("./m.js", &[]),
        ]);
        let scripted = Scripted::default().module("./entry.js", |frame| {
            let first = frame.require("./m")?;
            let second = frame.require("./m.js")?;
            assert!(first.ptr_eq(&second));
            Ok(())
        });
        let runs = Rc::clone(&scripted.runs);

        let mut loader = Loader::new(&graph, scripted);
        loader.run().unwrap();
        let again = loader.require("./m.js").unwrap();

        assert_eq!(runs.borrow()["./m.js"], 1);
        assert!(again.ptr_eq(&loader.cache().get("./m.js").unwrap().exports));
        assert_eq!(loader.state("./m.js"), ModuleState::Cached);
    }

    #[test]
    fn test_repeated_top_level_require_returns_same_container() {
        let graph = graph(&[("./entry.js", &[])]);
        let scripted = Scripted::default();
        let runs = Rc::clone(&scripted.runs);
        let mut loader = Loader::new(&graph, scripted);

        let first = loader.run().unwrap();
        let second = loader.run().unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(runs.borrow()["./entry.js"], 1);
    }

    #[test]
    fn test_circular_require_sees_partial_exports() {
        let graph = graph(&[
            ("./a.js", &[("./b.js", "./b.js")]),
            ("./b.js", &[("./a.js", "./a.js")]),
        ]);
        let scripted = Scripted::default()
            .module("./a.js", |frame| {
                frame.exports().set("early", 1);
                let b = frame.require("./b.js")?;
                frame
                    .exports()
                    .set("b_done", b.get("done").unwrap_or(Value::Null));
                frame.exports().set("done", true);
                Ok(())
            })
            .module("./b.js", |frame| {
                let a = frame.require("./a.js")?;
                assert_eq!(frame.loader.state("./a.js"), ModuleState::Executing);
                frame
                    .exports()
                    .set("a_early", a.get("early").unwrap_or(Value::Null));
                frame
                    .exports()
                    .set("a_done", a.get("done").unwrap_or(Value::Null));
                frame.exports().set("done", true);
                Ok(())
            });
        let runs = Rc::clone(&scripted.runs);

        let mut loader = Loader::new(&graph, scripted);
        let a = loader.run().unwrap();
        let b = loader.require("./b.js").unwrap();

        assert_eq!(a.get("b_done"), Some(Value::Bool(true)));
        assert_eq!(b.get("a_early"), Some(Value::from(1)));
        assert_eq!(b.get("a_done"), Some(Value::Null));
        assert_eq!(runs.borrow()["./a.js"], 1);
        assert_eq!(runs.borrow()["./b.js"], 1);
        assert_eq!(loader.state("./a.js"), ModuleState::Cached);
    }

    #[test]
    fn test_lookup_error_for_unknown_id() {
        let graph = graph(&[("./entry.js", &[("./gone.js", "./gone.js")])]);
        let scripted = Scripted::default().module("./entry.js", |frame| {
            frame.require("./gone.js").map(|_| ())
        });

        let mut loader = Loader::new(&graph, scripted);

        assert_eq!(
            loader.run().unwrap_err(),
            RuntimeError::Lookup {
                id: "./gone.js".to_string()
            }
        );
        assert!(matches!(
            loader.require("./nowhere.js"),
            Err(RuntimeError::Lookup { .. })
        ));
    }

    #[test]
    fn test_unmapped_specifier() {
        let graph = graph(&[("./entry.js", &[])]);
        let scripted = Scripted::default()
            .module("./entry.js", |frame| frame.require("fs").map(|_| ()));

        let err = Loader::new(&graph, scripted).run().unwrap_err();

        assert_eq!(
            err.to_string(),
            "Module './entry.js' has no dependency 'fs'"
        );
    }

    #[test]
    fn test_thrown_errors_propagate_unmodified() {
        let graph = graph(&[
            ("./entry.js", &[("./mid.js", "./mid.js")]),
            ("./mid.js", &[("./boom.js", "./boom.js")]),
            ("./boom.js", &[]),
        ]);
        let thrown = serde_json::json!({ "name": "TypeError", "message": "boom" });
        let expected = thrown.clone();
        let scripted = Scripted::default()
            .module("./entry.js", |frame| frame.require("./mid.js").map(|_| ()))
            .module("./mid.js", |frame| frame.require("./boom.js").map(|_| ()))
            .module("./boom.js", move |frame| {
                frame.exports().set("partial", true);
                Err(RuntimeError::Thrown(thrown.clone()))
            });
        let runs = Rc::clone(&scripted.runs);

        let mut loader = Loader::new(&graph, scripted);

        assert_eq!(loader.run().unwrap_err(), RuntimeError::Thrown(expected.clone()));
        for id in ["./entry.js", "./mid.js", "./boom.js"] {
            assert_eq!(loader.state(id), ModuleState::Failed, "{id}");
        }

        assert_eq!(
            loader.require("./boom.js").unwrap_err(),
            RuntimeError::Thrown(expected)
        );
        assert_eq!(runs.borrow()["./boom.js"], 1);
        assert_eq!(loader.cache().len(), 3);
    }

    #[test]
    fn test_failed_module_never_reruns() {
        let graph = graph(&[
            ("./e.js", &[("./boom.js", "./boom.js")]),
            ("./boom.js", &[]),
        ]);
        let scripted = Scripted::default()
            .module("./e.js", |frame| {
                let first = frame.require("./boom.js").unwrap_err();
                let second = frame.require("./boom.js").unwrap_err();
                assert_eq!(first, second);
                frame.exports().set("recovered", true);
                Ok(())
            })
            .module("./boom.js", |_| {
                Err(RuntimeError::Thrown(Value::from("boom")))
            });
        let runs = Rc::clone(&scripted.runs);

        let mut loader = Loader::new(&graph, scripted);
        let exports = loader.run().unwrap();

        assert_eq!(exports.get("recovered"), Some(Value::Bool(true)));
        assert_eq!(runs.borrow()["./boom.js"], 1);
        assert_eq!(loader.state("./boom.js"), ModuleState::Failed);
        assert_eq!(loader.state("./e.js"), ModuleState::Cached);
    }

    #[test]
    fn test_closure_evaluator() {
        let graph = graph(&[("./entry.js", &[])]);
        let evaluator = |code: &str, frame: &mut Frame<'_, '_>| -> Result<(), RuntimeError> {
            frame.exports().set("code", code);
            Ok(())
        };

        let exports = Loader::new(&graph, evaluator).run().unwrap();

        assert_eq!(exports.get("code"), Some(Value::from("/* ./entry.js */")));
    }

    #[test]
    fn test_loaders_are_isolated() {
        let graph = graph(&[("./entry.js", &[])]);
        let mut first = Loader::new(&graph, Scripted::default());
        let mut second = Loader::new(&graph, Scripted::default());

        let a = first.run().unwrap();
        let b = second.run().unwrap();

        assert!(!a.ptr_eq(&b));
        assert_eq!(second.cache().len(), 1);
    }
}

//! Shared fakes for loader integration tests.
//!
//! `FakeServer` serves in-memory modules keyed by absolute path.
//! `ScriptEvaluator` runs a tiny line-based module language:
//!
//! ```text
//! export <name> = <int> | <alias> | <alias>.<field> | @url | @filename | @dirname
//! import <alias> from "<specifier>"
//! log <text...>
//! yield                      -- suspend once
//! wait                       -- suspend until the test calls `release`
//! throw <message...>         -- execution error with a stack
//! throw-frame <message...>   -- execution error with a source frame
//! ```

#![allow(dead_code)]

use devload_core::paths::{normalize_path, to_slash};
use devload_core::{
    DevServer, ExecutionError, LoadError, LoaderConfig, ModuleGraph, ResolvedId, ServerConfig,
    TransformService, TransformedModule,
};
use devload_runtime::{
    DiagnosticSink, Evaluator, Exports, LoaderOptions, ModuleLoader, ModuleScope, Namespace,
};
use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tokio::sync::Notify;

pub const ROOT: &str = "/project";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct FakeGraph {
    invalidations: Cell<usize>,
}

impl ModuleGraph for FakeGraph {
    fn invalidate_all(&self) {
        self.invalidations.set(self.invalidations.get() + 1);
    }
}

pub struct FakeServer {
    config: ServerConfig,
    graph: FakeGraph,
    files: RefCell<HashMap<String, String>>,
    externals: RefCell<Vec<String>>,
    fetches: RefCell<HashMap<String, usize>>,
}

impl FakeServer {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            config: ServerConfig::new(ROOT),
            graph: FakeGraph::default(),
            files: RefCell::new(HashMap::new()),
            externals: RefCell::new(Vec::new()),
            fetches: RefCell::new(HashMap::new()),
        })
    }

    /// Add or replace a module. `path` is relative to `ROOT`.
    pub fn add(&self, path: &str, code: &str) -> String {
        let id = format!("{ROOT}/{path}");
        self.files.borrow_mut().insert(id.clone(), code.to_string());
        id
    }

    /// Resolve `specifier` as an external module.
    pub fn add_external(&self, specifier: &str) {
        self.externals.borrow_mut().push(specifier.to_string());
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches.borrow().get(id).copied().unwrap_or(0)
    }

    pub fn graph_invalidations(&self) -> usize {
        self.graph.invalidations.get()
    }

    fn lookup(&self, id: &str, importer: Option<&str>) -> Option<ResolvedId> {
        if self.externals.borrow().iter().any(|e| e == id) {
            return Some(ResolvedId::external(id));
        }

        let candidate = match importer {
            Some(importer) if id.starts_with("./") || id.starts_with("../") => {
                let dir = Path::new(importer).parent()?;
                to_slash(&normalize_path(&dir.join(id)))
            }
            _ => id.to_string(),
        };

        let files = self.files.borrow();
        [candidate.clone(), format!("{candidate}.ts")]
            .into_iter()
            .find(|c| files.contains_key(c))
            .map(ResolvedId::new)
    }
}

impl TransformService for FakeServer {
    fn resolve_id<'a>(
        &'a self,
        id: &'a str,
        importer: Option<&'a str>,
    ) -> LocalBoxFuture<'a, Result<Option<ResolvedId>, LoadError>> {
        async move {
            tokio::task::yield_now().await;
            Ok(self.lookup(id, importer))
        }
        .boxed_local()
    }

    fn fetch_module<'a>(
        &'a self,
        id: &'a str,
    ) -> LocalBoxFuture<'a, Result<TransformedModule, LoadError>> {
        async move {
            tokio::task::yield_now().await;
            *self.fetches.borrow_mut().entry(id.to_string()).or_default() += 1;

            let code = self.files.borrow().get(id).cloned();
            match code {
                Some(code) if code.starts_with("!syntax") => Err(LoadError::Transform {
                    id: id.to_string(),
                    message: "Unexpected token".to_string(),
                    frame: Some(format!("> 1 | {code}\n    |  ^")),
                }),
                Some(code) if code == "!external" => Ok(TransformedModule::external()),
                Some(code) => Ok(TransformedModule::new(code)),
                None => Err(LoadError::Transform {
                    id: id.to_string(),
                    message: format!("Failed to load url {id}"),
                    frame: None,
                }),
            }
        }
        .boxed_local()
    }
}

impl DevServer for FakeServer {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn module_graph(&self) -> &dyn ModuleGraph {
        &self.graph
    }
}

#[derive(Default)]
pub struct ScriptEvaluator {
    log: RefCell<Vec<String>>,
    evaluations: RefCell<HashMap<String, usize>>,
    externals: RefCell<HashMap<String, Exports>>,
    gate: Notify,
}

impl ScriptEvaluator {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn evaluations(&self, id: &str) -> usize {
        self.evaluations.borrow().get(id).copied().unwrap_or(0)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn provide_external(&self, id: &str, exports: Exports) {
        self.externals.borrow_mut().insert(id.to_string(), exports);
    }

    /// Let one `wait` line proceed.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn run(&self, code: &str, scope: &ModuleScope) -> Result<(), LoadError> {
        let id = scope.meta.id.as_str();
        let mut locals: HashMap<String, Exports> = HashMap::new();

        for line in code.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["export", name, "=", value] => {
                    bind(&scope.exports, name, value, &locals, scope);
                }
                ["import", alias, "from", specifier] => {
                    let ns = scope.importer.import(specifier.trim_matches('"')).await?;
                    locals.insert((*alias).to_string(), ns);
                }
                ["log", rest @ ..] => {
                    self.log.borrow_mut().push(format!("{id}: {}", rest.join(" ")));
                }
                ["yield"] => tokio::task::yield_now().await,
                ["wait"] => self.gate.notified().await,
                ["throw", rest @ ..] => {
                    let message = rest.join(" ");
                    return Err(ExecutionError::new(message.clone())
                        .with_stack(format!("Error: {message}\n    at {id}"))
                        .into());
                }
                ["throw-frame", rest @ ..] => {
                    return Err(ExecutionError::new(rest.join(" "))
                        .with_frame(format!("> 1 | {line}"))
                        .with_stack(format!("Error: {}\n    at {id}", rest.join(" ")))
                        .into());
                }
                _ => {
                    return Err(ExecutionError::new(format!("SyntaxError: {line}")).into());
                }
            }
        }
        Ok(())
    }
}

fn bind(
    exports: &Namespace,
    name: &str,
    value: &str,
    locals: &HashMap<String, Exports>,
    scope: &ModuleScope,
) {
    if let Ok(number) = value.parse::<i64>() {
        exports.set(name, number);
    } else if value == "@url" {
        exports.set(name, scope.meta.url.clone());
    } else if value == "@filename" {
        exports.set(name, scope.meta.filename.clone());
    } else if value == "@dirname" {
        exports.set(name, scope.meta.dirname.clone());
    } else if let Some((alias, field)) = value.split_once('.') {
        if let Some(v) = locals.get(alias).and_then(|ns| ns.get_value(field)) {
            exports.set_value(name, v);
        }
    } else if let Some(ns) = locals.get(value) {
        exports.set_value(name, ns.clone());
    }
}

impl Evaluator for ScriptEvaluator {
    fn evaluate<'a>(
        &'a self,
        module: &'a TransformedModule,
        scope: ModuleScope,
    ) -> LocalBoxFuture<'a, Result<(), LoadError>> {
        async move {
            *self
                .evaluations
                .borrow_mut()
                .entry(scope.meta.id.clone())
                .or_default() += 1;
            self.run(&module.code, &scope).await
        }
        .boxed_local()
    }

    fn import_external<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<Exports, LoadError>> {
        let found = self.externals.borrow().get(id).cloned();
        async move { found.ok_or_else(|| LoadError::ExternalUnsupported { id: id.to_string() }) }
            .boxed_local()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    reports: RefCell<Vec<String>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<String> {
        self.reports.borrow().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &str) {
        self.reports.borrow_mut().push(diagnostic.to_string());
    }
}

pub struct Harness {
    pub server: Rc<FakeServer>,
    pub evaluator: Rc<ScriptEvaluator>,
    pub sink: Rc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            server: FakeServer::new(),
            evaluator: ScriptEvaluator::new(),
            sink: Rc::new(RecordingSink::default()),
        }
    }

    pub fn loader(&self, throws: bool) -> ModuleLoader {
        let config = LoaderConfig::default()
            .with_throws(throws)
            .with_color(false)
            .with_cwd(ROOT);
        ModuleLoader::new(
            LoaderOptions::new(self.server.clone(), self.evaluator.clone())
                .with_config(config)
                .with_sink(self.sink.clone()),
        )
    }
}

/// Read an `i64` export.
pub fn int(exports: &Namespace, name: &str) -> Option<i64> {
    exports.get::<i64>(name).map(|v| *v)
}

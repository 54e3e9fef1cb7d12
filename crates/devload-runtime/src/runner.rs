//! Recursive module execution.
//!
//! `execute_file` resolves an entry path, fetches transformed code through
//! the session's transform cache and hands it to the [`Evaluator`]. Nested
//! imports re-enter the runner through [`ModuleImporter`], depth first.
//!
//! A module is marked in flight before its body runs. Re-entering it from
//! its own import chain, or from a chain it is itself waiting on, yields the
//! partially populated exports; any other caller waits for the body to
//! settle instead of running it twice.
//!
//! The body is stored in the record as a shared future. A caller that gives
//! up does not cancel it: the next request for the same id resumes the body
//! where it stopped and caches the result as usual.

use crate::cache::{Execution, LoaderSession, Lookup, Outcome};
use crate::evaluator::{Evaluator, ModuleMeta, ModuleScope};
use crate::namespace::{Exports, Namespace};
use devload_core::paths::{is_builtin, normalize_module_id, normalize_request_id, to_slash};
use devload_core::{LoadError, ResolvedId, TransformService};
use futures::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, trace};

/// Executes modules on top of a [`LoaderSession`].
pub struct ExecutionRunner {
    inner: Rc<RunnerInner>,
}

struct RunnerInner {
    session: Rc<LoaderSession>,
    evaluator: Rc<dyn Evaluator>,
}

impl ExecutionRunner {
    #[must_use]
    pub fn new(session: Rc<LoaderSession>, evaluator: Rc<dyn Evaluator>) -> Self {
        Self {
            inner: Rc::new(RunnerInner { session, evaluator }),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Rc<LoaderSession> {
        &self.inner.session
    }

    /// Execute the module at an absolute path and return its exports.
    ///
    /// Repeated calls within one session return the same exports handle.
    pub async fn execute_file(&self, path: &Path) -> Result<Exports, LoadError> {
        Rc::clone(&self.inner)
            .request(to_slash(path), None, Vec::new())
            .await
    }
}

impl RunnerInner {
    fn request(
        self: Rc<Self>,
        specifier: String,
        importer: Option<String>,
        stack: Vec<String>,
    ) -> LocalBoxFuture<'static, Outcome> {
        async move {
            let resolved = self.resolve(&specifier, importer.as_deref()).await?;
            if let Some(importer) = importer.as_deref() {
                self.session.executions().add_import(importer, &resolved.id);
            }
            self.cached_request(&resolved, importer.as_deref(), &stack)
                .await
        }
        .boxed_local()
    }

    async fn resolve(&self, specifier: &str, importer: Option<&str>) -> Result<ResolvedId, LoadError> {
        let server = self.session.server();
        let request = normalize_request_id(specifier, &server.config().base);
        if is_builtin(&request) {
            return Ok(ResolvedId::external(request));
        }

        trace!(specifier = %request, importer, "resolving module");
        match server.resolve_id(&request, importer).await? {
            Some(resolved) => Ok(ResolvedId {
                external: resolved.external || is_builtin(&resolved.id),
                id: normalize_module_id(&resolved.id),
            }),
            None if request.starts_with('/') || Path::new(&request).is_absolute() => {
                Ok(ResolvedId::new(normalize_module_id(&request)))
            }
            None => Err(LoadError::NotFound {
                specifier: specifier.to_string(),
                importer: importer.map(str::to_string),
            }),
        }
    }

    async fn cached_request(
        self: &Rc<Self>,
        resolved: &ResolvedId,
        importer: Option<&str>,
        stack: &[String],
    ) -> Outcome {
        let id = resolved.id.as_str();
        match self.session.executions().lookup(id) {
            Lookup::Evaluated(exports) => {
                trace!(id, "execution cache hit");
                Ok(exports)
            }
            Lookup::InFlight { exports, execution } => {
                // Waiting on a module that is, however indirectly, waiting on our chain would deadlock.
                if self.session.executions().reaches_in_flight(id, stack) {
                    debug!(id, "circular import, using partial exports");
                    return Ok(exports);
                }
                trace!(id, "waiting for in-flight module");
                execution.await
            }
            Lookup::Miss => self.direct_request(resolved, importer, stack).await,
        }
    }

    fn direct_request(
        self: &Rc<Self>,
        resolved: &ResolvedId,
        importer: Option<&str>,
        stack: &[String],
    ) -> Execution {
        let placeholder = Namespace::new();
        let execution = Rc::clone(self)
            .run(resolved.clone(), placeholder.clone(), stack.to_vec())
            .boxed_local()
            .shared();
        self.session
            .executions()
            .begin(&resolved.id, importer, placeholder, execution.clone());
        execution
    }

    async fn run(self: Rc<Self>, resolved: ResolvedId, placeholder: Exports, stack: Vec<String>) -> Outcome {
        debug!(id = %resolved.id, "executing module");
        let outcome = self.evaluate(&resolved, &placeholder, &stack).await;
        match &outcome {
            Ok(_) => debug!(id = %resolved.id, "module executed"),
            Err(err) => debug!(id = %resolved.id, error = %err, "module execution failed"),
        }
        self.settle(&resolved.id, &placeholder, &outcome);
        outcome
    }

    fn settle(&self, id: &str, placeholder: &Exports, outcome: &Outcome) {
        let executions = self.session.executions();
        match outcome {
            Ok(exports) => {
                if !executions.finish(id, placeholder, exports.clone()) {
                    debug!(id, "module invalidated while executing, not caching");
                }
            }
            Err(_) => {
                // A failed module is retried from scratch, never served partially.
                if executions.abort(id, placeholder) {
                    self.session.transforms().remove(id);
                }
            }
        }
    }

    async fn evaluate(
        self: &Rc<Self>,
        resolved: &ResolvedId,
        exports: &Exports,
        stack: &[String],
    ) -> Outcome {
        if resolved.external {
            return self.evaluator.import_external(&resolved.id).await;
        }

        let module = self.session.fetch_module(&resolved.id).await?;
        if module.external {
            return self.evaluator.import_external(&resolved.id).await;
        }

        let mut chain = stack.to_vec();
        chain.push(resolved.id.clone());

        let scope = ModuleScope {
            meta: ModuleMeta::new(&resolved.id, &self.session.server().config().root),
            exports: exports.clone(),
            importer: ModuleImporter {
                runner: Rc::clone(self),
                importer: resolved.id.clone(),
                stack: chain,
            },
        };

        self.evaluator.evaluate(&module, scope).await?;
        Ok(exports.clone())
    }
}

/// Import hook bound to one executing module.
///
/// Specifiers are resolved with this module as the importer and executed
/// through the same runner, so caches and the in-flight guard are shared.
#[derive(Clone)]
pub struct ModuleImporter {
    runner: Rc<RunnerInner>,
    importer: String,
    stack: Vec<String>,
}

impl ModuleImporter {
    /// Id of the module this hook belongs to.
    #[must_use]
    pub fn importer(&self) -> &str {
        &self.importer
    }

    /// Import chain from the entry point down to (and including) this module.
    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.stack
    }

    /// Resolve and execute `specifier`, returning its exports.
    pub fn import(&self, specifier: &str) -> LocalBoxFuture<'static, Outcome> {
        Rc::clone(&self.runner).request(
            specifier.to_string(),
            Some(self.importer.clone()),
            self.stack.clone(),
        )
    }
}

impl fmt::Debug for ModuleImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleImporter")
            .field("importer", &self.importer)
            .field("chain", &self.stack)
            .finish_non_exhaustive()
    }
}

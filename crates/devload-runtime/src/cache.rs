//! Transform and execution caches.
//!
//! Both caches live in a [`LoaderSession`] owned by one loader, so several
//! dev servers can run isolated loaders side by side. Neither cache has a
//! size bound or expiry; their lifetime is the session's.
//!
//! All mutation happens synchronously between suspension points, so the
//! `RefCell`s are never borrowed across an `.await`.

use crate::namespace::Exports;
use devload_core::{DevServer, LoadError, TransformService, TransformedModule};
use futures::future::{LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Final result of executing a module, shared by every caller that awaited it.
pub type Outcome = Result<Exports, LoadError>;

/// A module body in progress. Whoever awaits a clone drives it forward.
pub type Execution = Shared<LocalBoxFuture<'static, Outcome>>;

/// Transformed code by module id.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: RefCell<HashMap<String, Rc<TransformedModule>>>,
}

impl TransformCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Rc<TransformedModule>> {
        self.entries.borrow().get(id).cloned()
    }

    pub fn insert(&self, id: impl Into<String>, module: Rc<TransformedModule>) {
        self.entries.borrow_mut().insert(id.into(), module);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.entries.borrow_mut().remove(id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Execution state of a module record.
pub enum ModuleState {
    /// The module body is running. Survives its original caller being dropped.
    Evaluating(Execution),
    Evaluated,
}

impl fmt::Debug for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluating(_) => f.write_str("Evaluating"),
            Self::Evaluated => f.write_str("Evaluated"),
        }
    }
}

/// An executed (or executing) module.
#[derive(Debug)]
pub struct ModuleRecord {
    pub id: String,
    /// Populated by the module body; handed out partially while evaluating.
    pub exports: Exports,
    pub state: ModuleState,
    /// Ids this module requested.
    pub imports: HashSet<String>,
    /// Ids that requested this module.
    pub importers: HashSet<String>,
}

impl ModuleRecord {
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        matches!(self.state, ModuleState::Evaluated)
    }
}

/// Snapshot of an execution-cache slot, taken without holding a borrow.
pub enum Lookup {
    Miss,
    Evaluated(Exports),
    InFlight {
        exports: Exports,
        execution: Execution,
    },
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => f.write_str("Miss"),
            Self::Evaluated(exports) => f.debug_tuple("Evaluated").field(exports).finish(),
            Self::InFlight { exports, .. } => f
                .debug_struct("InFlight")
                .field("exports", exports)
                .finish_non_exhaustive(),
        }
    }
}

/// Executed modules by module id.
#[derive(Debug, Default)]
pub struct ExecutionCache {
    entries: RefCell<HashMap<String, ModuleRecord>>,
}

impl ExecutionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lookup(&self, id: &str) -> Lookup {
        match self.entries.borrow().get(id) {
            None => Lookup::Miss,
            Some(record) => match &record.state {
                ModuleState::Evaluated => Lookup::Evaluated(record.exports.clone()),
                ModuleState::Evaluating(execution) => Lookup::InFlight {
                    exports: record.exports.clone(),
                    execution: execution.clone(),
                },
            },
        }
    }

    /// Exports of a module, finished or not.
    #[must_use]
    pub fn exports(&self, id: &str) -> Option<Exports> {
        self.entries.borrow().get(id).map(|r| r.exports.clone())
    }

    /// Mark `id` in flight. `exports` is the namespace `execution` populates.
    ///
    /// Replaces any existing record.
    pub fn begin(&self, id: &str, importer: Option<&str>, exports: Exports, execution: Execution) {
        let mut entries = self.entries.borrow_mut();

        // Keep importer edges recorded by earlier, failed attempts.
        let mut importers = entries
            .remove(id)
            .map(|old| old.importers)
            .unwrap_or_default();
        if let Some(importer) = importer {
            importers.insert(importer.to_string());
        }

        entries.insert(
            id.to_string(),
            ModuleRecord {
                id: id.to_string(),
                exports,
                state: ModuleState::Evaluating(execution),
                imports: HashSet::new(),
                importers,
            },
        );
    }

    /// Mark the record started with `placeholder` as evaluated.
    ///
    /// `exports` replaces the placeholder when they differ (external modules).
    /// Returns `false` if the record was invalidated in the meantime.
    pub fn finish(&self, id: &str, placeholder: &Exports, exports: Exports) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(id) {
            Some(record) if Rc::ptr_eq(&record.exports, placeholder) => {
                record.exports = exports;
                record.state = ModuleState::Evaluated;
                true
            }
            _ => false,
        }
    }

    /// Drop the in-flight record started with `placeholder`.
    ///
    /// Returns `false` if the record was already invalidated or replaced.
    pub fn abort(&self, id: &str, placeholder: &Exports) -> bool {
        let mut entries = self.entries.borrow_mut();
        let ours = entries
            .get(id)
            .is_some_and(|record| Rc::ptr_eq(&record.exports, placeholder));
        if ours {
            entries.remove(id);
        }
        ours
    }

    /// Whether an in-flight module reachable from `id` along import edges is on `stack`.
    ///
    /// Only in-flight records are followed; an evaluated module waits on nothing.
    #[must_use]
    pub fn reaches_in_flight(&self, id: &str, stack: &[String]) -> bool {
        let entries = self.entries.borrow();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            if stack.iter().any(|s| s == current) {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(record) = entries.get(current) {
                if !record.is_evaluated() {
                    queue.extend(record.imports.iter().map(String::as_str));
                }
            }
        }
        false
    }

    /// Record that `importer` requested `id`.
    pub fn add_import(&self, importer: &str, id: &str) {
        let mut entries = self.entries.borrow_mut();
        if let Some(record) = entries.get_mut(importer) {
            record.imports.insert(id.to_string());
        }
        if let Some(record) = entries.get_mut(id) {
            record.importers.insert(importer.to_string());
        }
    }

    #[must_use]
    pub fn importers(&self, id: &str) -> Vec<String> {
        self.entries
            .borrow()
            .get(id)
            .map(|r| r.importers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.entries.borrow_mut().remove(id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of records still evaluating.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|r| !r.is_evaluated())
            .count()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub transformed: usize,
    pub executed: usize,
    pub in_flight: usize,
}

/// Loader state bound to one development server.
pub struct LoaderSession {
    server: Rc<dyn DevServer>,
    transforms: TransformCache,
    executions: ExecutionCache,
    /// Bumped on every invalidation. Fetches that straddle one are not cached.
    epoch: Cell<u64>,
}

impl LoaderSession {
    #[must_use]
    pub fn new(server: Rc<dyn DevServer>) -> Self {
        Self {
            server,
            transforms: TransformCache::new(),
            executions: ExecutionCache::new(),
            epoch: Cell::new(0),
        }
    }

    #[must_use]
    pub fn server(&self) -> &Rc<dyn DevServer> {
        &self.server
    }

    #[must_use]
    pub fn transforms(&self) -> &TransformCache {
        &self.transforms
    }

    #[must_use]
    pub fn executions(&self) -> &ExecutionCache {
        &self.executions
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Read-through fetch of transformed code.
    pub async fn fetch_module(&self, id: &str) -> Result<Rc<TransformedModule>, LoadError> {
        if let Some(module) = self.transforms.get(id) {
            trace!(id, "transform cache hit");
            return Ok(module);
        }

        let epoch = self.epoch.get();
        trace!(id, "fetching transformed module");
        let module = Rc::new(self.server.fetch_module(id).await?);

        if self.epoch.get() == epoch {
            self.transforms.insert(id, module.clone());
        } else {
            debug!(id, "caches invalidated during fetch, not caching result");
        }
        Ok(module)
    }

    /// Drop everything: the server's graph bookkeeping, then both caches.
    pub fn invalidate_all(&self) {
        self.server.module_graph().invalidate_all();
        self.transforms.clear();
        self.executions.clear();
        self.epoch.set(self.epoch.get() + 1);
        debug!(epoch = self.epoch.get(), "invalidated all modules");
    }

    /// Drop `ids` and every module that transitively imports them from both caches.
    ///
    /// Returns the invalidated ids.
    pub fn invalidate_dep_tree<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<String> = ids.into_iter().map(str::to_string).collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            queue.extend(self.executions.importers(&id));
            self.executions.remove(&id);
            self.transforms.remove(&id);
        }

        self.epoch.set(self.epoch.get() + 1);

        let mut invalidated: Vec<String> = seen.into_iter().collect();
        invalidated.sort();
        debug!(count = invalidated.len(), "invalidated dependency tree");
        invalidated
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            transformed: self.transforms.len(),
            executed: self.executions.len(),
            in_flight: self.executions.in_flight(),
        }
    }
}

//! Contracts with the development server.
//!
//! The loader never transforms source itself. It asks a [`TransformService`]
//! to resolve specifiers and hand back executable code, and tells the
//! server's [`ModuleGraph`] when its own caches are dropped.

use crate::config::ServerConfig;
use crate::error::LoadError;
use futures::future::LocalBoxFuture;

/// Result of resolving a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Resolver-normalized module id.
    pub id: String,
    /// The module is provided by the host runtime instead of the transform pipeline.
    pub external: bool,
}

impl ResolvedId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: false,
        }
    }

    #[must_use]
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
        }
    }
}

/// A module after it went through the server's transform pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformedModule {
    /// Executable code.
    pub code: String,
    /// Source map for `code`, serialized.
    pub map: Option<String>,
    /// Load through the evaluator's external hook instead of evaluating `code`.
    pub external: bool,
    /// The module accepts hot updates of itself.
    pub self_accepting: bool,
}

impl TransformedModule {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn external() -> Self {
        Self {
            external: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }

    #[must_use]
    pub fn with_self_accepting(mut self, self_accepting: bool) -> Self {
        self.self_accepting = self_accepting;
        self
    }
}

/// Resolution and transformation, owned by the development server.
///
/// Both operations may suspend on I/O. Failures are reported as
/// [`LoadError::NotFound`], [`LoadError::Resolve`] or [`LoadError::Transform`].
pub trait TransformService {
    /// Resolve `id` as imported by `importer`. `None` importer means an entry point.
    fn resolve_id<'a>(
        &'a self,
        id: &'a str,
        importer: Option<&'a str>,
    ) -> LocalBoxFuture<'a, Result<Option<ResolvedId>, LoadError>>;

    /// Transform the module with the given resolved id.
    fn fetch_module<'a>(
        &'a self,
        id: &'a str,
    ) -> LocalBoxFuture<'a, Result<TransformedModule, LoadError>>;
}

/// The server's module dependency graph; the source of truth for "what changed".
pub trait ModuleGraph {
    /// Drop all invalidation bookkeeping.
    fn invalidate_all(&self);
}

/// A bound development-server handle.
pub trait DevServer: TransformService {
    fn config(&self) -> &ServerConfig;

    fn module_graph(&self) -> &dyn ModuleGraph;
}

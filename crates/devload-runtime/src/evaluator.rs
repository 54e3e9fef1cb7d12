//! The isolated evaluation context.
//!
//! The runner owns caching and recursion; an [`Evaluator`] owns the actual
//! language runtime. It receives transformed code together with a
//! [`ModuleScope`] and must route every nested import through
//! [`ModuleScope::importer`] so the runner sees the whole import graph.

use crate::namespace::Exports;
use crate::runner::ModuleImporter;
use devload_core::paths::{file_url, to_file_path};
use devload_core::{LoadError, TransformedModule};
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::path::{Path, PathBuf};

/// File metadata bound into module scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMeta {
    /// Normalized module id.
    pub id: String,
    /// File the module was loaded from.
    pub filename: PathBuf,
    /// Directory containing `filename`.
    pub dirname: PathBuf,
    /// `file://` url of `filename`.
    pub url: String,
}

impl ModuleMeta {
    #[must_use]
    pub fn new(id: &str, root: &Path) -> Self {
        let filename = to_file_path(id, root);
        let dirname = filename
            .parent()
            .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
        let url = file_url(&filename);
        Self {
            id: id.to_string(),
            filename,
            dirname,
            url,
        }
    }
}

/// Everything a module body can reach besides globals.
#[derive(Debug, Clone)]
pub struct ModuleScope {
    pub meta: ModuleMeta,
    /// The module's export binding point. Importers already hold this handle.
    pub exports: Exports,
    /// Scoped import hook; resolves relative to this module.
    pub importer: ModuleImporter,
}

/// A language runtime able to run transformed code.
pub trait Evaluator {
    /// Run `module` to completion, writing its exports into `scope.exports`.
    ///
    /// Errors from nested imports should be returned as-is.
    fn evaluate<'a>(
        &'a self,
        module: &'a TransformedModule,
        scope: ModuleScope,
    ) -> LocalBoxFuture<'a, Result<(), LoadError>>;

    /// Load a module the host runtime provides natively.
    fn import_external<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<Exports, LoadError>> {
        future::ready(Err(LoadError::ExternalUnsupported { id: id.to_string() })).boxed_local()
    }
}

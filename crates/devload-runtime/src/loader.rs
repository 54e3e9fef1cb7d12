//! The loader facade.
//!
//! ```ignore
//! let loader = ModuleLoader::new(LoaderOptions::new(server, evaluator));
//! if let Some(exports) = loader.load_module("src/Button.story.ts").await? {
//!     // ...
//! }
//! loader.clear_cache();
//! loader.destroy().await;
//! ```

use crate::cache::LoaderSession;
use crate::diagnostics::{format_load_error, DiagnosticSink, StderrSink};
use crate::evaluator::Evaluator;
use crate::namespace::Exports;
use crate::runner::ExecutionRunner;
use devload_core::paths::absolutize;
use devload_core::{DevServer, LoadError, LoaderConfig};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Construction-time options for [`ModuleLoader`].
pub struct LoaderOptions {
    /// Bound development-server handle.
    pub server: Rc<dyn DevServer>,
    /// Runtime that executes transformed code.
    pub evaluator: Rc<dyn Evaluator>,
    pub config: LoaderConfig,
    /// Where load-failure diagnostics go.
    pub sink: Rc<dyn DiagnosticSink>,
}

impl LoaderOptions {
    #[must_use]
    pub fn new(server: Rc<dyn DevServer>, evaluator: Rc<dyn Evaluator>) -> Self {
        Self {
            server,
            evaluator,
            config: LoaderConfig::default(),
            sink: Rc::new(StderrSink),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Rethrow load errors after reporting them.
    #[must_use]
    pub fn with_throws(mut self, throws: bool) -> Self {
        self.config.throws = throws;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Rc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// Loads modules through a development server's transform pipeline.
pub struct ModuleLoader {
    runner: ExecutionRunner,
    config: LoaderConfig,
    cwd: PathBuf,
    sink: Rc<dyn DiagnosticSink>,
}

impl ModuleLoader {
    #[must_use]
    pub fn new(options: LoaderOptions) -> Self {
        let session = Rc::new(LoaderSession::new(options.server));
        let cwd = options.config.base_dir();
        Self {
            runner: ExecutionRunner::new(session, options.evaluator),
            config: options.config,
            cwd,
            sink: options.sink,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &LoaderSession {
        self.runner.session()
    }

    /// Invalidate the server's module graph and both loader caches.
    ///
    /// Safe to call at any time, any number of times.
    pub fn clear_cache(&self) {
        self.runner.session().invalidate_all();
    }

    /// Load `file` and return its exports.
    ///
    /// Failures are always reported to the diagnostic sink. They resolve to
    /// `Ok(None)` unless the loader was built with `throws`, in which case
    /// the original error is returned.
    pub async fn load_module(&self, file: impl AsRef<Path>) -> Result<Option<Exports>, LoadError> {
        let file = file.as_ref();
        let path = absolutize(file, &self.cwd);

        match self.runner.execute_file(&path).await {
            Ok(exports) => Ok(Some(exports)),
            Err(err) => {
                debug!(file = %file.display(), error = %err, "module load failed");
                self.sink.report(&format_load_error(
                    &file.display().to_string(),
                    &err,
                    self.config.color,
                ));
                if self.config.throws {
                    Err(err)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Release loader resources.
    ///
    /// Nothing is held today; callers still await this before dropping the
    /// loader.
    pub async fn destroy(&self) {
        debug!(stats = ?self.session().stats(), "module loader destroyed");
    }
}

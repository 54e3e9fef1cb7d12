#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! On-demand module loader for devload.
//!
//! Loads a file the way the development server would serve it: transformed
//! on request, executed in an evaluator, and cached until the server reports
//! a change.
//!
//! Everything here is single-threaded. Loads may interleave at suspension
//! points; the execution cache's in-flight guard keeps each module
//! executing at most once per session.

pub mod cache;
pub mod diagnostics;
pub mod evaluator;
pub mod loader;
pub mod namespace;
pub mod runner;

pub use cache::{CacheStats, ExecutionCache, LoaderSession, ModuleRecord, TransformCache};
pub use diagnostics::{format_load_error, DiagnosticSink, StderrSink};
pub use evaluator::{Evaluator, ModuleMeta, ModuleScope};
pub use loader::{LoaderOptions, ModuleLoader};
pub use namespace::{ExportValue, Exports, Namespace};
pub use runner::{ExecutionRunner, ModuleImporter};

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Core types for devload.
//!
//! This crate holds the contracts between the module loader and the
//! development server it sits on: the transform service, the module graph,
//! the transformed module payload, and the error taxonomy that flows back
//! through recursive execution. It has no logging or runtime dependencies.

pub mod config;
pub mod error;
pub mod paths;
pub mod service;

pub use config::{LoaderConfig, ServerConfig};
pub use error::{Error, ExecutionError, LoadError};
pub use service::{DevServer, ModuleGraph, ResolvedId, TransformService, TransformedModule};

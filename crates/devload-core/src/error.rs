use std::fmt::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for configuration handling.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// An error thrown by evaluated module code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    /// The thrown message.
    pub message: String,
    /// Source excerpt pointing at the failing location, if the runtime produced one.
    pub frame: Option<String>,
    /// Stack trace captured at the throw site.
    pub stack: Option<String>,
}

impl ExecutionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frame: None,
            stack: None,
        }
    }

    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Error raised while resolving, transforming or executing a module.
///
/// Errors are cloned rather than wrapped as they travel up the import chain,
/// so the loader facade always sees the value that was originally raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Cannot find module '{specifier}'{}", importer_suffix(.importer.as_deref()))]
    NotFound {
        specifier: String,
        importer: Option<String>,
    },

    #[error("Failed to resolve '{specifier}': {message}")]
    Resolve { specifier: String, message: String },

    #[error("Failed to transform '{id}': {message}")]
    Transform {
        id: String,
        message: String,
        frame: Option<String>,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("External module '{id}' cannot be loaded by this evaluator")]
    ExternalUnsupported { id: String },
}

fn importer_suffix(importer: Option<&str>) -> String {
    importer.map_or_else(String::new, |i| format!(" imported from '{i}'"))
}

impl LoadError {
    /// The bare message, without the variant prefix used by `Display`.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Transform { message, .. } | Self::Resolve { message, .. } => message.clone(),
            Self::Execution(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// Source excerpt attached to the error, if any.
    #[must_use]
    pub fn frame(&self) -> Option<&str> {
        match self {
            Self::Transform { frame, .. } => frame.as_deref(),
            Self::Execution(e) => e.frame.as_deref(),
            _ => None,
        }
    }

    /// Full trace for diagnostics.
    ///
    /// Execution errors report their captured stack. Every other variant
    /// renders as `Error: <display>` followed by its source chain.
    #[must_use]
    pub fn stack(&self) -> String {
        if let Self::Execution(ExecutionError {
            stack: Some(stack), ..
        }) = self
        {
            return stack.clone();
        }

        let mut out = format!("Error: {self}");
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let _ = write!(out, "\n    caused by: {err}");
            source = err.source();
        }
        out
    }
}

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Loader configuration.
///
/// Decided once at construction time; in particular `throws` is never
/// chosen per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Rethrow load errors to the caller after reporting them.
    pub throws: bool,

    /// Colorize diagnostics with ANSI escapes.
    pub color: bool,

    /// Base directory for relative file paths. Falls back to the process cwd.
    pub cwd: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            throws: false,
            color: true,
            cwd: None,
        }
    }
}

impl LoaderConfig {
    /// Set whether load errors propagate to the caller.
    #[must_use]
    pub fn with_throws(mut self, throws: bool) -> Self {
        self.throws = throws;
        self
    }

    /// Set diagnostic colorization.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Set the base directory for relative paths.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The directory relative paths are resolved against.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.cwd.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Parse a config from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The slice of development-server configuration the loader needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Project root. Root-relative module ids (`/src/x.ts`) are joined onto it.
    pub root: PathBuf,

    /// Public base path the server mounts modules under.
    #[serde(default = "default_base")]
    pub base: String,
}

fn default_base() -> String {
    "/".to_string()
}

impl ServerConfig {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base: default_base(),
        }
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }
}

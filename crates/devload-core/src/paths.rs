//! Path and module-id normalization.
//!
//! The dev server hands out several spellings for the same module
//! (`/@fs/` prefixed paths, `file://` URLs, root-relative urls with
//! cache-busting queries). Everything that keys a cache goes through
//! [`normalize_module_id`] first so one file maps to one cache entry.

use std::path::{Component, Path, PathBuf};
use url::Url;

/// Prefix the dev server uses for files outside the project root.
pub const FS_PREFIX: &str = "/@fs/";

/// Prefix the dev server uses for ids that are not valid urls.
pub const VALID_ID_PREFIX: &str = "/@id/";

/// Encoded form of the `\0` virtual module marker inside urls.
pub const NULL_BYTE_PLACEHOLDER: &str = "__x00__";

/// Prefix of runtime builtin modules.
pub const BUILTIN_PREFIX: &str = "node:";

/// Normalize a path by removing `.` and resolving `..` components.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other),
        }
    }
    result
}

/// Make `path` absolute against `cwd` and normalize it lexically.
#[must_use]
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    dunce::simplified(&normalize_path(&joined)).to_path_buf()
}

/// Render a path with forward slashes.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Whether `id` names a runtime builtin.
#[must_use]
pub fn is_builtin(id: &str) -> bool {
    id.starts_with(BUILTIN_PREFIX)
}

/// Canonical cache key for a resolved module id.
#[must_use]
pub fn normalize_module_id(id: &str) -> String {
    if is_builtin(id) || id.starts_with('\0') {
        return id.to_string();
    }

    let mut id = id.replace('\\', "/");

    if id.starts_with("file://") {
        if let Some(path) = Url::parse(&id).ok().and_then(|u| u.to_file_path().ok()) {
            id = to_slash(&path);
        } else if let Some(rest) = id.strip_prefix("file://") {
            id = rest.to_string();
        }
    }

    if let Some(rest) = id.strip_prefix(FS_PREFIX) {
        id = if cfg!(windows) {
            rest.to_string()
        } else {
            format!("/{rest}")
        };
    }

    if id.starts_with("//") {
        id = format!("/{}", id.trim_start_matches('/'));
    }

    id
}

/// Strip the server-specific decorations from a request id.
///
/// Removes the `base` mount prefix, unwraps `/@id/` virtual ids and drops
/// the `import` / `t=<timestamp>` query parameters the dev server appends.
#[must_use]
pub fn normalize_request_id(id: &str, base: &str) -> String {
    let mut id = id.to_string();

    if base != "/" && !base.is_empty() {
        if let Some(rest) = id.strip_prefix(base) {
            id = format!("/{}", rest.trim_start_matches('/'));
        }
    }

    if let Some(rest) = id.strip_prefix(VALID_ID_PREFIX) {
        id = match rest.strip_prefix(NULL_BYTE_PLACEHOLDER) {
            Some(virtual_id) => format!("\0{virtual_id}"),
            None => rest.to_string(),
        };
    }

    if let Some((path, query)) = id.split_once('?') {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|param| !param.is_empty() && *param != "import" && !param.starts_with("t="))
            .collect();
        id = if kept.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", kept.join("&"))
        };
    }

    id
}

/// Map a module id onto the file it was loaded from.
///
/// Ids already inside `root`, or naming a file that exists, are taken
/// verbatim. Other slash-prefixed ids are root-relative urls.
#[must_use]
pub fn to_file_path(id: &str, root: &Path) -> PathBuf {
    if is_builtin(id) || id.starts_with('\0') {
        return PathBuf::from(id);
    }

    let path = id.split_once('?').map_or(id, |(path, _)| path);
    let candidate = PathBuf::from(path);

    if candidate.starts_with(root) || candidate.exists() {
        return candidate;
    }

    match path.strip_prefix('/') {
        Some(rest) => root.join(rest),
        None => candidate,
    }
}

/// `file://` url for a path, as exposed to evaluated code.
#[must_use]
pub fn file_url(path: &Path) -> String {
    Url::from_file_path(path).map_or_else(|()| format!("file://{}", to_slash(path)), String::from)
}

//! Helpers for host path strings.
//!
//! Build hosts hand us issuers and context directories as plain strings. These
//! helpers keep them as strings so that a value written back into a host
//! record is exactly what the host would have produced itself.

use std::path::{Component, Path, PathBuf};

/// Directory portion of a path string, following Node's `path.dirname`.
///
/// `"/app/foo.js"` -> `"/app"`, `"/foo.js"` -> `"/"`, `"foo.js"` -> `"."`.
#[must_use]
pub fn dirname(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
        Some(parent) => parent.to_string_lossy().into_owned(),
        // Root or empty input
        None if path.is_empty() => ".".to_string(),
        None => path.to_string(),
    }
}

/// Join a relative specifier onto a directory, collapsing `.` and `..` segments.
#[must_use]
pub fn join_normalized(dir: &str, relative: &str) -> String {
    normalize(&Path::new(dir).join(relative))
        .to_string_lossy()
        .into_owned()
}

/// Collapse `.` and `..` segments lexically.
///
/// Unlike [`Path::canonicalize`], this never touches the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` is `root` itself or lies underneath it.
#[must_use]
pub fn is_within(path: &str, root: &str) -> bool {
    !root.is_empty() && Path::new(path).starts_with(root)
}

/// `dir` followed by at most `depth - 1` of its ancestors, nearest first.
#[must_use]
pub fn ancestors(dir: &Path, depth: usize) -> Vec<PathBuf> {
    dir.ancestors().take(depth).map(Path::to_path_buf).collect()
}

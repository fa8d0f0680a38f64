//! Store paths: POSIX-style, slash-separated, rooted at `/`.
//!
//! Every path handed to the backend goes through [`normalize`] first, so
//! `"/a/b/"`, `"/a//b"` and `"a/b"` all address the same node. A missing
//! leading `/` is a caller error that is tolerated with a warning.

use crate::{Error, Result};

/// Path separator.
pub const SEPARATOR: char = '/';

/// The container root.
pub const ROOT: &str = "/";

/// Non-empty components of `path`, in order.
pub fn tokens(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).filter(|t| !t.is_empty()).collect()
}

/// Canonical form: leading `/`, no trailing `/`, no empty components.
pub fn normalize(path: &str) -> String {
    if !path.is_empty() && !path.starts_with(SEPARATOR) {
        tracing::warn!(path, "store path has no leading '/', treating it as rooted");
    }
    let parts = tokens(path);
    if parts.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Parent of `path`. The parent of the root is the root.
pub fn parent(path: &str) -> String {
    let parts = tokens(path);
    match parts.len() {
        0 | 1 => ROOT.to_string(),
        n => format!("/{}", parts[..n - 1].join("/")),
    }
}

/// Final component of `path`, or `""` for the root.
pub fn leaf(path: &str) -> &str {
    tokens(path).last().copied().unwrap_or("")
}

/// Append `name` to `parent`.
pub fn join(parent: &str, name: &str) -> String {
    let mut parts = tokens(parent);
    parts.extend(tokens(name));
    if parts.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Directory depth of `path`.
///
/// One trailing separator is stripped, then separators are counted; a
/// leading separator is not counted. This is the depth of the directory
/// components, not the number of nodes: `"/a"` is 0 and `"/a/b/"` is 1.
pub fn depth(path: &str) -> usize {
    let trimmed = path.strip_suffix(SEPARATOR).unwrap_or(path);
    let count = trimmed.matches(SEPARATOR).count();
    if trimmed.starts_with(SEPARATOR) {
        count - 1
    } else {
        if !trimmed.is_empty() {
            tracing::warn!(path, "path depth requested for a path without leading '/'");
        }
        count
    }
}

/// True when `path` names the container root.
pub fn is_root(path: &str) -> bool {
    tokens(path).is_empty()
}

/// Check that `name` is usable as a single path component.
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("empty name".into()));
    }
    if name.contains(SEPARATOR) {
        return Err(Error::InvalidName(format!("{name:?} contains '{SEPARATOR}'")));
    }
    Ok(())
}

// src/fs/path_utils.rs

//! Path helpers shared by the staging area and the command template.

use std::path::{Component, Path};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if `path` is not below `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Directory containing `path`, relative to `root`, slash-separated.
///
/// Files directly in `root` (and paths outside it) yield the empty string,
/// which is what `%dir` expands to.
pub fn relative_dir(root: &Path, path: &Path) -> String {
    path.parent()
        .and_then(|parent| relative_str(root, parent))
        .unwrap_or_default()
}

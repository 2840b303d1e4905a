// src/watch/classifier.rs

//! Turn raw filesystem notifications into actions.

use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};
use regex::Regex;

/// Filesystem operation reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Write,
    Remove,
    Rename,
    PermissionChange,
}

/// What to do about one `(path, operation)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Excluded, or nothing to do.
    Ignored,
    /// A directory appeared: watch it and everything below it.
    RegisterTree(PathBuf),
    /// A directory went away: stop watching it and its subdirectories.
    UnregisterTree(PathBuf),
    /// File content activity; (re)start its inactivity timer.
    Activity(PathBuf),
    /// The file is gone; drop any pending dispatch.
    Removal(PathBuf),
}

/// `true` if `path` matches the exclusion pattern.
pub fn is_excluded(path: &Path, exclude: Option<&Regex>) -> bool {
    exclude.is_some_and(|re| re.is_match(&path.to_string_lossy()))
}

/// Classify one operation. `is_dir` says whether the path is (or, for a
/// removed path, was) a directory.
pub fn classify(
    path: &Path,
    op: Operation,
    is_dir: bool,
    exclude: Option<&Regex>,
) -> Classification {
    if op == Operation::PermissionChange || is_excluded(path, exclude) {
        return Classification::Ignored;
    }

    let path = path.to_path_buf();
    match (is_dir, op) {
        (true, Operation::Create) => Classification::RegisterTree(path),
        (true, Operation::Remove | Operation::Rename) => Classification::UnregisterTree(path),
        (true, _) => Classification::Ignored,
        (false, Operation::Create | Operation::Write) => Classification::Activity(path),
        (false, Operation::Remove | Operation::Rename) => Classification::Removal(path),
        (false, Operation::PermissionChange) => Classification::Ignored,
    }
}

/// Map a `notify` event onto per-path operations.
///
/// `exists` is consulted only for rename events that do not say which side
/// of the rename they describe.
pub fn operations(
    kind: &EventKind,
    paths: &[PathBuf],
    exists: impl Fn(&Path) -> bool,
) -> Vec<(PathBuf, Operation)> {
    let each = |op: Operation| -> Vec<(PathBuf, Operation)> {
        paths.iter().map(|p| (p.clone(), op)).collect()
    };

    match kind {
        EventKind::Create(_) => each(Operation::Create),
        EventKind::Remove(_) => each(Operation::Remove),
        EventKind::Modify(ModifyKind::Metadata(_)) => each(Operation::PermissionChange),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => each(Operation::Rename),
            RenameMode::To => each(Operation::Create),
            RenameMode::Both => {
                let mut ops = Vec::with_capacity(2);
                if let Some(from) = paths.first() {
                    ops.push((from.clone(), Operation::Rename));
                }
                if let Some(to) = paths.get(1) {
                    ops.push((to.clone(), Operation::Create));
                }
                ops
            }
            RenameMode::Any | RenameMode::Other => paths
                .iter()
                .map(|p| {
                    let op = if exists(p) {
                        Operation::Create
                    } else {
                        Operation::Rename
                    };
                    (p.clone(), op)
                })
                .collect(),
        },
        EventKind::Modify(_) => each(Operation::Write),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

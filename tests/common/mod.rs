#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use settled::config::private_staging_name;

pub use settled_test_utils::builders::SettingsBuilder;
pub use settled_test_utils::fake_runner::{Behaviour, FakeRunner};
pub use settled_test_utils::{eventually, init_tracing, with_timeout};

/// A temporary tree laid out like a real deployment:
///
/// ```text
/// <tmp>/watch                  watched directory
/// <tmp>/stage                  configured staging parent
/// <tmp>/stage/settled-<pid>    staging directory owned by the engine
/// <tmp>/watch.fail             quarantine (created on demand)
/// ```
pub struct Fixture {
    _tmp: TempDir,
    pub watch_dir: PathBuf,
    pub staging_parent: PathBuf,
    pub staging_dir: PathBuf,
    pub quarantine_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        let watch_dir = base.join("watch");
        fs::create_dir_all(&watch_dir).unwrap();

        Self {
            _tmp: tmp,
            staging_parent: base.join("stage"),
            staging_dir: base.join("stage").join(private_staging_name()),
            quarantine_dir: base.join("watch.fail"),
            watch_dir,
        }
    }

    /// Settings for this tree; staging dir already filled in.
    pub fn settings(&self, command: &str) -> SettingsBuilder {
        SettingsBuilder::new(&self.watch_dir, command).staging_dir(&self.staging_parent)
    }

    /// Write `contents` to `rel` below the watch dir, creating parents.
    pub fn write(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.watch_dir.join(rel);
        write_file(&path, contents);
        path
    }

    pub fn watch_path(&self, rel: &str) -> PathBuf {
        self.watch_dir.join(rel)
    }
}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Every regular file below `dir`, relative and slash-separated, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

/// Entry names of an in-memory tar archive.
pub fn tar_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = tar::Archive::new(bytes);
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

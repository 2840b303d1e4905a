// src/fs/mock.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::FileSystem;

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

/// In-memory filesystem for exercising the staging area without touching
/// disk.
///
/// Parent directories must exist before files can be created in them, which
/// is what catches a missing `create_dir_all` in the code under test.
/// [`MockFileSystem::set_cross_device`] makes every `rename` fail the way a
/// move across mount points does.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
    cross_device: Arc<AtomicBool>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock().dirs.insert(PathBuf::from("/"));
        fs
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_cross_device(&self, enabled: bool) {
        self.cross_device.store(enabled, Ordering::SeqCst);
    }

    /// Create a file, implicitly creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            insert_dir_chain(&mut state, parent);
        }
        state.files.insert(path, content.into());
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        self.lock().dirs.contains(path.as_ref())
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }
}

fn insert_dir_chain(state: &mut MockState, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        state.dirs.insert(ancestor.to_path_buf());
    }
}

fn require_parent(state: &MockState, path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !state.dirs.contains(parent) => {
            Err(anyhow!("No such directory: {:?}", parent))
        }
        _ => Ok(()),
    }
}

impl FileSystem for MockFileSystem {
    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if self.cross_device.load(Ordering::SeqCst) {
            return Err(anyhow!("Invalid cross-device link: {:?} -> {:?}", from, to));
        }
        let mut state = self.lock();
        require_parent(&state, to)?;
        let content = state
            .files
            .remove(from)
            .ok_or_else(|| anyhow!("File not found: {:?}", from))?;
        state.files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let mut state = self.lock();
        require_parent(&state, to)?;
        let content = state
            .files
            .get(from)
            .cloned()
            .ok_or_else(|| anyhow!("File not found: {:?}", from))?;
        let len = content.len() as u64;
        state.files.insert(to.to_path_buf(), content);
        Ok(len)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        insert_dir_chain(&mut self.lock(), path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if !state.dirs.contains(path) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }
        state.files.retain(|p, _| !p.starts_with(path));
        state.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .lock()
            .files
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect())
    }
}

// src/fs/staging.rs

//! The staging area: a private directory where settled files wait while
//! their command runs, plus the moves into and out of it.
//!
//! Layout, for a watch root `/data` and staging dir `/tmp/settled-42`:
//!
//! ```text
//! /data/sub/a.txt            (original)
//! /tmp/settled-42/sub/a.txt  (staged)
//! /tmp/settled-42/.batches/  (archives being filled)
//! /data.fail/                (quarantine)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, trace, warn};

use crate::config::Settings;
use crate::fs::path_utils::relative_dir;
use crate::fs::FileSystem;

/// Sub-directory of the staging area that holds archives in progress.
pub const BATCHES_DIR: &str = ".batches";

/// A file that has been moved out of the watch tree and awaits dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Where the file lived inside the watch root.
    pub original: PathBuf,
    /// Where it lives now inside the staging area.
    pub staged: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    fs: Arc<dyn FileSystem>,
    watch_root: PathBuf,
    staging_dir: PathBuf,
    quarantine_dir: PathBuf,
}

impl StagingArea {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        watch_root: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        quarantine_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            watch_root: watch_root.into(),
            staging_dir: staging_dir.into(),
            quarantine_dir: quarantine_dir.into(),
        }
    }

    pub fn from_settings(settings: &Settings, fs: Arc<dyn FileSystem>) -> Self {
        Self::new(
            fs,
            settings.watch_dir.clone(),
            settings.staging_dir.clone(),
            settings.quarantine_dir.clone(),
        )
    }

    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine_dir
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.staging_dir.join(BATCHES_DIR)
    }

    /// Create the staging directory.
    pub fn init(&self) -> Result<()> {
        self.fs.create_dir_all(&self.staging_dir)?;
        info!(dir = ?self.staging_dir, "initialized staging dir");
        Ok(())
    }

    /// `%dir` for a file that originally lived at `original`.
    pub fn relative_dir(&self, original: &Path) -> String {
        relative_dir(&self.watch_root, original)
    }

    /// Path of `original` relative to the watch root.
    pub fn relative_path<'a>(&self, original: &'a Path) -> Result<&'a Path> {
        original.strip_prefix(&self.watch_root).map_err(|_| {
            anyhow!(
                "{:?} is not inside the watch root {:?}",
                original,
                self.watch_root
            )
        })
    }

    /// Where `original` lives while staged.
    pub fn staged_path(&self, original: &Path) -> Result<PathBuf> {
        Ok(self.staging_dir.join(self.relative_path(original)?))
    }

    /// `true` while a previous version of `original` is still staged.
    pub fn is_busy(&self, original: &Path) -> bool {
        self.staged_path(original)
            .is_ok_and(|staged| self.fs.exists(&staged))
    }

    /// Move a settled file from the watch tree into the staging area,
    /// preserving its path relative to the watch root. Refuses to overwrite
    /// a previous version that is still staged.
    pub fn stage(&self, original: &Path) -> Result<StagedFile> {
        let staged = self.staged_path(original)?;
        if self.fs.exists(&staged) {
            return Err(anyhow!(
                "{:?} is still staged from a previous dispatch",
                original
            ));
        }

        self.move_file(original, &staged)
            .with_context(|| format!("staging {:?}", original))?;

        trace!(?original, ?staged, "moved to staging dir");

        Ok(StagedFile {
            original: original.to_path_buf(),
            staged,
        })
    }

    /// Put a staged file back where it came from.
    ///
    /// If something new already occupies the original path it is left alone
    /// and the staged copy goes to quarantine instead.
    pub fn revert(&self, file: &StagedFile) -> Result<PathBuf> {
        if self.fs.exists(&file.original) {
            warn!(
                original = ?file.original,
                "original path is occupied by a newer file; quarantining instead of reverting"
            );
            let rel = self.relative_path(&file.original)?;
            let dest = self.quarantine_dir.join(rel);
            self.move_file(&file.staged, &dest)?;
            return Ok(dest);
        }

        self.move_file(&file.staged, &file.original)
            .with_context(|| format!("reverting {:?}", file.original))?;
        debug!(original = ?file.original, "reverted staged file");
        Ok(file.original.clone())
    }

    /// Move a failed archive (or file) into the quarantine area, keeping its
    /// file name.
    pub fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow!("cannot quarantine {:?}: no file name", path))?;
        let dest = self.quarantine_dir.join(name);
        self.move_file(path, &dest)
            .with_context(|| format!("quarantining {:?}", path))?;
        Ok(dest)
    }

    /// Delete a dispatched file. A file already gone is fine: commands such
    /// as `mv` or `rclone move` consume their input.
    pub fn discard(&self, path: &Path) -> Result<()> {
        if !self.fs.is_file(path) {
            return Ok(());
        }
        self.fs.remove_file(path)
    }

    /// Move anything still left in the staging area into quarantine, keeping
    /// relative paths. Returns how many files were rescued.
    pub fn salvage(&self) -> Result<usize> {
        if !self.fs.exists(&self.staging_dir) {
            return Ok(0);
        }

        let mut rescued = 0;
        for path in self.fs.list_files(&self.staging_dir)? {
            let Ok(rel) = path.strip_prefix(&self.staging_dir) else {
                continue;
            };
            let dest = self.quarantine_dir.join(rel);
            match self.move_file(&path, &dest) {
                Ok(()) => {
                    warn!(from = ?path, to = ?dest, "salvaged leftover staged file");
                    rescued += 1;
                }
                Err(err) => warn!(path = ?path, error = %err, "failed to salvage staged file"),
            }
        }
        Ok(rescued)
    }

    /// Remove the staging directory and everything in it.
    pub fn cleanup(&self) -> Result<()> {
        if self.fs.exists(&self.staging_dir) {
            self.fs.remove_dir_all(&self.staging_dir)?;
        }
        Ok(())
    }

    /// Rename, falling back to copy + delete when the rename is refused
    /// (typically because source and destination are on different devices).
    pub fn move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            self.fs.create_dir_all(parent)?;
        }

        let rename_err = match self.fs.rename(src, dst) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if !self.fs.is_file(src) {
            return Err(rename_err);
        }
        debug!(?src, ?dst, error = %rename_err, "rename failed; copying instead");

        if let Err(err) = self.fs.copy(src, dst) {
            let _ = self.fs.remove_file(dst);
            return Err(err);
        }
        self.fs.remove_file(src)
    }
}

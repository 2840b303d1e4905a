// src/batch/archive.rs

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tar::Builder;

/// Local-time archive name, e.g. `2024-05-01 13.45.07.123.tar`.
const NAME_FORMAT: &str = "%Y-%m-%d %H.%M.%S%.3f";

/// One tar container being filled.
pub struct ArchiveBatch {
    path: PathBuf,
    builder: Builder<File>,
    entries: usize,
}

impl std::fmt::Debug for ArchiveBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveBatch")
            .field("path", &self.path)
            .field("entries", &self.entries)
            .finish()
    }
}

impl ArchiveBatch {
    /// Create a new, empty archive in `dir`, named after the current time.
    /// A `-N` suffix is added when the name is already taken.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating batch dir {:?}", dir))?;

        let stamp = chrono::Local::now().format(NAME_FORMAT).to_string();
        let mut suffix = 0usize;

        loop {
            let name = if suffix == 0 {
                format!("{stamp}.tar")
            } else {
                format!("{stamp}-{suffix}.tar")
            };
            let path = dir.join(name);

            match File::options().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        builder: Builder::new(file),
                        entries: 0,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(err) => {
                    return Err(err).with_context(|| format!("creating archive {:?}", path));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Append the file at `source` (content and metadata) under
    /// `name_in_archive`.
    pub fn append(&mut self, source: &Path, name_in_archive: &Path) -> Result<()> {
        self.builder
            .append_path_with_name(source, name_in_archive)
            .with_context(|| format!("appending {:?} to archive {:?}", source, self.path))?;
        self.entries += 1;
        Ok(())
    }

    /// Write the tar trailer and close the file. Returns the archive path.
    pub fn finish(self) -> Result<PathBuf> {
        let mut file = self
            .builder
            .into_inner()
            .with_context(|| format!("finalizing archive {:?}", self.path))?;
        file.flush()
            .with_context(|| format!("flushing archive {:?}", self.path))?;
        Ok(self.path)
    }
}

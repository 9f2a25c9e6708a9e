//! Hand-off of finished recordings
//!
//! Called from the finalize thread, never from the delivery worker.

use anyhow::{bail, Context};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Receives finished outputs
pub trait StorageSink: Send + Sync {
    fn store(&self, output: &Path) -> anyhow::Result<()>;
}

/// Moves finished outputs into a library directory
pub struct DirectoryStorageSink {
    library_dir: PathBuf,
}

impl DirectoryStorageSink {
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
        }
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }
}

impl StorageSink for DirectoryStorageSink {
    fn store(&self, output: &Path) -> anyhow::Result<()> {
        let name = output
            .file_name()
            .with_context(|| format!("Output has no file name: {:?}", output))?;
        fs::create_dir_all(&self.library_dir)
            .with_context(|| format!("Failed to create library dir {:?}", self.library_dir))?;

        let destination = self.library_dir.join(name);
        if destination.exists() {
            bail!("Library already contains {:?}", name);
        }

        // rename fails across filesystems; fall back to copy + remove
        if fs::rename(output, &destination).is_err() {
            copy_recursive(output, &destination)?;
            remove_any(output)?;
        }

        tracing::info!("Stored recording at {:?}", destination);
        Ok(())
    }
}

fn copy_recursive(from: &Path, to: &Path) -> anyhow::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to).with_context(|| format!("Failed to copy {:?}", from))?;
    }
    Ok(())
}

fn remove_any(path: &Path) -> anyhow::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Remembers outputs instead of moving them
#[derive(Default)]
pub struct CollectingStorageSink {
    stored: Mutex<Vec<PathBuf>>,
}

impl CollectingStorageSink {
    pub fn stored(&self) -> Vec<PathBuf> {
        self.stored.lock().clone()
    }
}

impl StorageSink for CollectingStorageSink {
    fn store(&self, output: &Path) -> anyhow::Result<()> {
        self.stored.lock().push(output.to_path_buf());
        Ok(())
    }
}
